//! Session cache behaviour: identity, TTL, capacity, single-flight,
//! failure propagation, sweep and teardown.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use common::MockSession;
use huginn::{HuginnError, ModelSession, SessionCache, SessionCacheConfig, SharedSession};

fn cache(ttl_ms: u64, max_sessions: usize) -> SessionCache {
    SessionCache::new(
        SessionCacheConfig::new()
            .ttl(Duration::from_millis(ttl_ms))
            .max_sessions(max_sessions),
    )
}

/// Look up `(provider, system)`, counting how often a session is created.
async fn lookup(
    cache: &SessionCache,
    provider: &str,
    system: &str,
    creates: &Arc<AtomicUsize>,
) -> SharedSession {
    let creates = Arc::clone(creates);
    cache
        .get_or_create(provider, system, move || async move {
            creates.fetch_add(1, Ordering::SeqCst);
            Ok(common::session())
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn lookups_within_ttl_return_same_handle() {
    let cache = cache(60_000, 5);
    let creates = Arc::new(AtomicUsize::new(0));

    let first = lookup(&cache, "local", "sys", &creates).await;
    let second = lookup(&cache, "local", "sys", &creates).await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_system_prompts_get_different_sessions() {
    let cache = cache(60_000, 5);
    let creates = Arc::new(AtomicUsize::new(0));

    let analysis = lookup(&cache, "local", "analysis", &creates).await;
    let questions = lookup(&cache, "local", "questions", &creates).await;

    assert!(!Arc::ptr_eq(&analysis, &questions));
    assert_eq!(creates.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_recreated() {
    let cache = cache(1000, 5);
    let creates = Arc::new(AtomicUsize::new(0));

    let original = lookup(&cache, "local", "sys", &creates).await;

    tokio::time::advance(Duration::from_millis(500)).await;
    let still_valid = lookup(&cache, "local", "sys", &creates).await;
    assert!(Arc::ptr_eq(&original, &still_valid));

    tokio::time::advance(Duration::from_millis(1000)).await;
    let renewed = lookup(&cache, "local", "sys", &creates).await;
    assert!(!Arc::ptr_eq(&original, &renewed));
    assert_eq!(creates.load(Ordering::SeqCst), 2);
    assert!(original.is_destroyed(), "stale session should be torn down");
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn capacity_evicts_oldest() {
    let cache = cache(60_000, 2);
    let creates = Arc::new(AtomicUsize::new(0));

    let a = lookup(&cache, "local", "A", &creates).await;
    tokio::time::advance(Duration::from_millis(10)).await;
    lookup(&cache, "local", "B", &creates).await;
    tokio::time::advance(Duration::from_millis(10)).await;
    lookup(&cache, "local", "C", &creates).await;

    assert_eq!(cache.len(), 2);
    assert!(!cache.contains("local", "A"));
    assert!(cache.contains("local", "B"));
    assert!(cache.contains("local", "C"));
    assert!(a.is_destroyed());
}

#[tokio::test]
async fn concurrent_lookups_share_one_creation() {
    let cache = cache(60_000, 5);
    let creates = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let create = |creates: Arc<AtomicUsize>, gate: Arc<Notify>| {
        move || async move {
            creates.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            Ok(common::session())
        }
    };

    let (first, second, ()) = tokio::join!(
        cache.get_or_create("local", "sys", create(creates.clone(), gate.clone())),
        cache.get_or_create("local", "sys", create(creates.clone(), gate.clone())),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(creates.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().in_flight, 0);
}

#[tokio::test]
async fn creation_failure_reaches_every_waiter() {
    let cache = cache(60_000, 5);
    let gate = Arc::new(Notify::new());

    let failing = |gate: Arc<Notify>| {
        move || async move {
            gate.notified().await;
            Err::<SharedSession, _>(HuginnError::Http("connection refused".into()))
        }
    };

    let (first, second, ()) = tokio::join!(
        cache.get_or_create("local", "sys", failing(gate.clone())),
        cache.get_or_create("local", "sys", failing(gate.clone())),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    let messages: Vec<String> = [first, second]
        .into_iter()
        .map(|result| match result {
            Err(HuginnError::SessionCreation { provider, message }) => {
                assert_eq!(provider, "local");
                message
            }
            other => panic!("expected SessionCreation, got ok={}", other.is_ok()),
        })
        .collect();
    assert_eq!(messages[0], messages[1]);

    let stats = cache.stats();
    assert_eq!(stats.count, 0, "failed creation must not be stored");
    assert_eq!(stats.in_flight, 0, "in-flight marker must be cleared");

    // next lookup starts a new creation
    let creates = Arc::new(AtomicUsize::new(0));
    lookup(&cache, "local", "sys", &creates).await;
    assert_eq!(creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn destroyed_session_is_not_returned() {
    let cache = cache(60_000, 5);
    let creates = Arc::new(AtomicUsize::new(0));

    let first = lookup(&cache, "local", "sys", &creates).await;
    first.destroy().await;

    let second = lookup(&cache, "local", "sys", &creates).await;
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!second.is_destroyed());
    assert_eq!(creates.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn destroy_all_tears_down_everything() {
    let cache = cache(60_000, 5);
    let creates = Arc::new(AtomicUsize::new(0));

    let a = lookup(&cache, "local", "A", &creates).await;
    let b = lookup(&cache, "local", "B", &creates).await;

    cache.destroy_all().await;
    assert!(a.is_destroyed());
    assert!(b.is_destroyed());
    assert!(cache.is_empty());

    let fresh = lookup(&cache, "local", "A", &creates).await;
    assert!(!fresh.is_destroyed());
    assert_eq!(creates.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn creation_finishing_after_destroy_all_is_discarded() {
    let cache = Arc::new(cache(60_000, 5));
    let gate = Arc::new(Notify::new());
    let late = MockSession::new();

    let waiter = {
        let cache = Arc::clone(&cache);
        let gate = Arc::clone(&gate);
        let session: SharedSession = late.clone();
        tokio::spawn(async move {
            cache
                .get_or_create("local", "sys", move || async move {
                    gate.notified().await;
                    Ok(session)
                })
                .await
        })
    };

    while cache.stats().in_flight == 0 {
        tokio::task::yield_now().await;
    }
    cache.destroy_all().await;
    gate.notify_one();

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(HuginnError::SessionCreation { .. })));
    assert!(late.is_destroyed());
    assert!(cache.is_empty());
}

async fn exploding() -> huginn::Result<SharedSession> {
    panic!("session factory exploded")
}

#[tokio::test]
async fn panicking_creation_releases_key() {
    let cache = cache(60_000, 5);

    match cache.get_or_create("local", "sys", exploding).await {
        Err(HuginnError::SessionCreation { provider, message }) => {
            assert_eq!(provider, "local");
            assert!(message.contains("exploded"), "{message}");
        }
        other => panic!("expected SessionCreation, got ok={}", other.is_ok()),
    }
    let stats = cache.stats();
    assert_eq!(stats.count, 0);
    assert_eq!(stats.in_flight, 0, "in-flight marker must be cleared");

    let creates = Arc::new(AtomicUsize::new(0));
    let session = lookup(&cache, "local", "sys", &creates).await;
    assert!(!session.is_destroyed());
    assert_eq!(creates.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_record_is_torn_down_by_replacing_creation() {
    let cache = cache(100, 5);
    let creates = Arc::new(AtomicUsize::new(0));
    let slow = MockSession::with_destroy_delay(Duration::from_millis(50));

    let stored: SharedSession = slow.clone();
    cache
        .get_or_create("local", "sys", move || async move { Ok(stored) })
        .await
        .unwrap();
    tokio::time::advance(Duration::from_millis(150)).await;

    // the caller gives up while the stale session is still being torn down
    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), lookup(&cache, "local", "sys", &creates))
            .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(slow.is_destroyed());
    assert_eq!(creates.load(Ordering::SeqCst), 1);
    assert!(cache.contains("local", "sys"));
}

#[tokio::test(start_paused = true)]
async fn destroy_all_waits_for_running_sweep() {
    let cache = SessionCache::new(
        SessionCacheConfig::new()
            .ttl(Duration::from_millis(100))
            .sweep_interval(Duration::from_secs(1)),
    );
    let sessions: Vec<Arc<MockSession>> = (0..3)
        .map(|_| MockSession::with_destroy_delay(Duration::from_millis(50)))
        .collect();
    for (i, session) in sessions.iter().enumerate() {
        let stored: SharedSession = session.clone();
        cache
            .get_or_create("local", &format!("sys-{i}"), move || async move {
                Ok(stored)
            })
            .await
            .unwrap();
    }

    // the sweep starts at 1s and spends 50ms on each teardown
    tokio::time::sleep(Duration::from_millis(1010)).await;
    assert!(!sessions[0].is_destroyed(), "sweep should still be running");

    cache.destroy_all().await;

    assert!(sessions.iter().all(|s| s.is_destroyed()));
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn sweep_removes_expired_records() {
    let cache = cache(100, 5);
    let creates = Arc::new(AtomicUsize::new(0));

    let a = lookup(&cache, "local", "A", &creates).await;
    tokio::time::advance(Duration::from_millis(60)).await;
    let b = lookup(&cache, "local", "B", &creates).await;
    tokio::time::advance(Duration::from_millis(60)).await;

    assert_eq!(cache.sweep().await, 1);
    assert!(a.is_destroyed());
    assert!(!b.is_destroyed());
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn background_sweep_runs_on_interval() {
    let cache = SessionCache::new(
        SessionCacheConfig::new()
            .ttl(Duration::from_millis(100))
            .sweep_interval(Duration::from_secs(1)),
    );
    let creates = Arc::new(AtomicUsize::new(0));

    let session = lookup(&cache, "local", "sys", &creates).await;
    assert_eq!(cache.len(), 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(cache.len(), 0);
    assert!(session.is_destroyed());
}

#[tokio::test(start_paused = true)]
async fn stats_report_entries() {
    let cache = cache(1000, 3);
    let creates = Arc::new(AtomicUsize::new(0));

    lookup(&cache, "local", "A", &creates).await;
    tokio::time::advance(Duration::from_millis(250)).await;
    lookup(&cache, "remote", "B", &creates).await;

    let stats = cache.stats();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.capacity, 3);
    assert_eq!(stats.ttl_ms, 1000);
    assert_eq!(stats.entries.len(), 2);
    // oldest first
    assert_eq!(stats.entries[0].provider, "local");
    assert_eq!(stats.entries[0].age_ms, 250);
    assert_eq!(stats.entries[0].key.len(), 12);
    assert!(stats.entries.iter().all(|e| e.valid));
}
