//! Keyed, time-bounded, capacity-bounded cache of live model sessions.
//!
//! Sessions are expensive: creating one may trigger a multi-gigabyte model
//! download. The cache guarantees:
//!
//! - a record older than `ttl` (measured from creation, not last use) or
//!   whose handle reports itself destroyed is never returned;
//! - at most `max_sessions` records are held; inserting into a full cache
//!   evicts the oldest record first;
//! - at most one creation is in flight per key. Concurrent callers for the
//!   same key share that creation and all see the same handle or the same
//!   failure.
//!
//! Creation runs on a spawned task, so it completes (and is cached) even if
//! every caller stops waiting. The same task tears down the stale record it
//! replaces, and a panicking creation is reported like any other failure.
//! A background sweep evicts expired records on a fixed interval;
//! [`SessionCache::destroy_all`] signals the sweep to stop and waits for a
//! pass in progress to finish before tearing everything down.
//!
//! # Lifecycle per key
//!
//! ```text
//! absent ──► creating ──► valid ──► expired ──► creating ...
//!               │                 └─► destroyed
//!               └─► absent (creation failed)
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::host::SharedSession;
use crate::telemetry;
use crate::types::{CacheStats, SessionStats};
use crate::{HuginnError, Result};

/// Configuration for a [`SessionCache`].
///
/// ```rust
/// # use huginn::SessionCacheConfig;
/// # use std::time::Duration;
/// let config = SessionCacheConfig::new()
///     .max_sessions(3)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct SessionCacheConfig {
    /// Maximum age of a session, measured from creation. Default: 30 minutes.
    pub ttl: Duration,
    /// Maximum number of cached sessions. Default: 5.
    pub max_sessions: usize,
    /// Interval between background sweeps. Default: 5 minutes.
    pub sweep_interval: Duration,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            max_sessions: 5,
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl SessionCacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session time-to-live.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum number of cached sessions (at least 1).
    pub fn max_sessions(mut self, n: usize) -> Self {
        self.max_sessions = n.max(1);
        self
    }

    /// Set the background sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Cache key derived from `(provider, system_prompt)`.
///
/// SHA-256 over both fields, each prefixed with its byte length so that
/// `("ab", "c")` and `("a", "bc")` never meet.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(provider: &str, system_prompt: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [provider, system_prompt] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for logs and status output.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", self.short())
    }
}

struct SessionRecord {
    key: SessionKey,
    session: SharedSession,
    provider: String,
    created_at: Instant,
    /// Insertion order; breaks `created_at` ties during capacity eviction.
    seq: u64,
}

impl SessionRecord {
    fn is_valid(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) < ttl && !self.session.is_destroyed()
    }
}

type CreationOutcome = std::result::Result<SharedSession, Arc<HuginnError>>;
type Creation = Shared<BoxFuture<'static, CreationOutcome>>;

#[derive(Default)]
struct CacheState {
    records: HashMap<SessionKey, SessionRecord>,
    in_flight: HashMap<SessionKey, Creation>,
    /// Bumped by `destroy_all`; creations from older generations are discarded.
    generation: u64,
    next_seq: u64,
}

impl CacheState {
    /// Remove oldest records until there is room for one more.
    fn make_room(&mut self, max_sessions: usize) -> Vec<SessionRecord> {
        let mut evicted = Vec::new();
        while self.records.len() >= max_sessions.max(1) {
            let oldest = self
                .records
                .values()
                .min_by_key(|r| (r.created_at, r.seq))
                .map(|r| r.key.clone());
            match oldest.and_then(|key| self.records.remove(&key)) {
                Some(record) => evicted.push(record),
                None => break,
            }
        }
        evicted
    }

    fn insert(&mut self, key: SessionKey, provider: String, session: SharedSession) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(
            key.clone(),
            SessionRecord {
                key,
                session,
                provider,
                created_at: Instant::now(),
                seq,
            },
        );
    }
}

struct Inner {
    config: SessionCacheConfig,
    state: Mutex<CacheState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // state stays consistent between statements, so a poisoned lock is usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the creation task and register it as in flight.
    ///
    /// The task tears down `stale` before creating its replacement.
    fn start_creation<Fut>(
        this: &Arc<Inner>,
        state: &mut CacheState,
        key: SessionKey,
        provider: &str,
        stale: Option<SessionRecord>,
        creation: Fut,
    ) -> Creation
    where
        Fut: Future<Output = Result<SharedSession>> + Send + 'static,
    {
        info!(provider, key = %key, "creating session");
        let inner = Arc::clone(this);
        let generation = state.generation;
        let task_key = key.clone();
        let task_provider = provider.to_string();
        let task = tokio::spawn(async move {
            if let Some(record) = stale {
                evict(record, "expired").await;
            }
            let outcome = match AssertUnwindSafe(creation).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => Err(HuginnError::SessionCreation {
                    provider: task_provider.clone(),
                    message: format!("session creation panicked: {}", panic_message(&*panic)),
                }),
            };
            inner
                .finish_creation(task_key, task_provider, generation, outcome)
                .await
        });

        let provider = provider.to_string();
        let shared = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Arc::new(HuginnError::SessionCreation {
                    provider,
                    message: format!("creation task failed: {e}"),
                })),
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(key, shared.clone());
        shared
    }

    /// Store (or discard) the outcome of a creation task.
    async fn finish_creation(
        &self,
        key: SessionKey,
        provider: String,
        generation: u64,
        outcome: Result<SharedSession>,
    ) -> CreationOutcome {
        enum Step {
            Failed(HuginnError),
            Orphaned(SharedSession),
            Stored(SharedSession, Vec<SessionRecord>),
        }

        let step = {
            let mut state = self.lock();
            let current = state.generation == generation;
            if current {
                state.in_flight.remove(&key);
            }
            match outcome {
                Err(e) => Step::Failed(e),
                Ok(session) if !current => Step::Orphaned(session),
                Ok(session) => {
                    let evicted = state.make_room(self.config.max_sessions);
                    state.insert(key.clone(), provider.clone(), Arc::clone(&session));
                    Step::Stored(session, evicted)
                }
            }
        };

        match step {
            Step::Failed(e) => {
                metrics::counter!(telemetry::SESSION_CREATIONS_TOTAL,
                    "provider" => provider.clone(),
                    "status" => "error",
                )
                .increment(1);
                warn!(provider = %provider, key = %key, error = %e, "session creation failed");
                Err(Arc::new(e))
            }
            Step::Orphaned(session) => {
                warn!(
                    provider = %provider,
                    key = %key,
                    "cache torn down during creation, discarding session"
                );
                session.destroy().await;
                Err(Arc::new(HuginnError::SessionCreation {
                    provider,
                    message: "session cache was torn down during creation".to_string(),
                }))
            }
            Step::Stored(session, evicted) => {
                metrics::counter!(telemetry::SESSION_CREATIONS_TOTAL,
                    "provider" => provider.clone(),
                    "status" => "ok",
                )
                .increment(1);
                info!(provider = %provider, key = %key, "session cached");
                for record in evicted {
                    evict(record, "capacity").await;
                }
                Ok(session)
            }
        }
    }

    /// Remove and tear down every invalid record.
    async fn sweep(&self) -> usize {
        let expired: Vec<SessionRecord> = {
            let mut state = self.lock();
            let now = Instant::now();
            let ttl = self.config.ttl;
            let keys: Vec<SessionKey> = state
                .records
                .values()
                .filter(|r| !r.is_valid(now, ttl))
                .map(|r| r.key.clone())
                .collect();
            keys.iter()
                .filter_map(|key| state.records.remove(key))
                .collect()
        };

        let removed = expired.len();
        for record in expired {
            evict(record, "expired").await;
        }
        removed
    }
}

async fn evict(record: SessionRecord, reason: &'static str) {
    metrics::counter!(telemetry::SESSION_EVICTIONS_TOTAL, "reason" => reason).increment(1);
    debug!(provider = %record.provider, key = %record.key, reason, "evicting session");
    record.session.destroy().await;
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Background sweep task and its stop signal.
struct Sweeper {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

/// The error every waiter of a failed creation receives.
fn creation_failure(provider: &str, err: &HuginnError) -> HuginnError {
    match err {
        HuginnError::SessionCreation { provider, message } => HuginnError::SessionCreation {
            provider: provider.clone(),
            message: message.clone(),
        },
        other => HuginnError::SessionCreation {
            provider: provider.to_string(),
            message: other.to_string(),
        },
    }
}

/// Session cache with single-flight creation. See the module docs.
pub struct SessionCache {
    inner: Arc<Inner>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl SessionCache {
    pub fn new(config: SessionCacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(CacheState::default()),
            }),
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionCacheConfig {
        &self.inner.config
    }

    /// Return the cached session for `(provider, system_prompt)`, creating
    /// it with `create` when there is no valid record.
    ///
    /// `create` is only invoked when this call starts a new creation; a
    /// caller that joins an in-flight creation drops it unused.
    pub async fn get_or_create<F, Fut>(
        &self,
        provider: &str,
        system_prompt: &str,
        create: F,
    ) -> Result<SharedSession>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<SharedSession>> + Send + 'static,
    {
        self.ensure_sweeper();
        let key = SessionKey::new(provider, system_prompt);

        let (creation, stale) = {
            let mut state = self.inner.lock();
            let now = Instant::now();
            if let Some(record) = state.records.get(&key)
                && record.is_valid(now, self.inner.config.ttl)
            {
                metrics::counter!(telemetry::SESSION_CACHE_HITS_TOTAL).increment(1);
                debug!(provider, key = %key, "session cache hit");
                return Ok(Arc::clone(&record.session));
            }

            metrics::counter!(telemetry::SESSION_CACHE_MISSES_TOTAL).increment(1);
            let stale = state.records.remove(&key);
            match state.in_flight.get(&key) {
                Some(creation) => {
                    debug!(provider, key = %key, "joining in-flight session creation");
                    (creation.clone(), stale)
                }
                None => {
                    let creation = Inner::start_creation(
                        &self.inner,
                        &mut state,
                        key,
                        provider,
                        stale,
                        create(),
                    );
                    (creation, None)
                }
            }
        };

        if let Some(record) = stale {
            tokio::spawn(evict(record, "expired"));
        }

        creation
            .await
            .map_err(|e| creation_failure(provider, &e))
    }

    /// Whether a valid record exists for `(provider, system_prompt)`.
    pub fn contains(&self, provider: &str, system_prompt: &str) -> bool {
        let key = SessionKey::new(provider, system_prompt);
        let state = self.inner.lock();
        state
            .records
            .get(&key)
            .is_some_and(|r| r.is_valid(Instant::now(), self.inner.config.ttl))
    }

    /// Number of records held, valid or not.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and tear down every expired or destroyed record.
    ///
    /// Runs automatically every `sweep_interval`; returns the number of
    /// records removed.
    pub async fn sweep(&self) -> usize {
        self.inner.sweep().await
    }

    /// Stop the background sweep and tear down every record.
    ///
    /// A sweep pass already running finishes first. Creations still in
    /// flight complete but are discarded. The cache remains usable; the next
    /// lookup starts from empty.
    pub async fn destroy_all(&self) {
        let sweeper = self.sweeper_lock().take();
        if let Some(Sweeper { handle, stop }) = sweeper {
            // the receiver is gone if the task already exited
            let _ = stop.send(true);
            if let Err(e) = handle.await {
                warn!(error = %e, "session sweep task failed");
            }
        }

        let records: Vec<SessionRecord> = {
            let mut state = self.inner.lock();
            state.generation += 1;
            state.in_flight.clear();
            state.records.drain().map(|(_, record)| record).collect()
        };

        if !records.is_empty() {
            info!(count = records.len(), "destroying cached sessions");
        }
        for record in records {
            evict(record, "teardown").await;
        }
    }

    /// Snapshot of the cache contents.
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock();
        let now = Instant::now();
        let ttl = self.inner.config.ttl;
        let mut entries: Vec<SessionStats> = state
            .records
            .values()
            .map(|r| SessionStats {
                key: r.key.short().to_string(),
                provider: r.provider.clone(),
                age_ms: now.saturating_duration_since(r.created_at).as_millis() as u64,
                valid: r.is_valid(now, ttl),
            })
            .collect();
        entries.sort_by(|a, b| b.age_ms.cmp(&a.age_ms));

        CacheStats {
            count: state.records.len(),
            capacity: self.inner.config.max_sessions,
            in_flight: state.in_flight.len(),
            ttl_ms: ttl.as_millis() as u64,
            entries,
        }
    }

    fn sweeper_lock(&self) -> MutexGuard<'_, Option<Sweeper>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the background sweep if it is not running.
    fn ensure_sweeper(&self) {
        let mut sweeper = self.sweeper_lock();
        if sweeper.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.sweep_interval.max(Duration::from_millis(1));
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                // a pass is never interrupted; the stop signal is only
                // observed between passes
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stopped.changed() => break,
                }
                let Some(inner) = weak.upgrade() else { break };
                let removed = inner.sweep().await;
                if removed > 0 {
                    debug!(removed, "swept expired sessions");
                }
            }
        });
        *sweeper = Some(Sweeper { handle, stop });
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(SessionCacheConfig::default())
    }
}

impl Drop for SessionCache {
    fn drop(&mut self) {
        // a pass in progress holds its own reference and runs to completion
        if let Some(sweeper) = self.sweeper_lock().take() {
            let _ = sweeper.stop.send(true);
        }
    }
}
