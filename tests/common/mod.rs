//! Scriptable in-process host used by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use huginn::{
    Availability, Huginn, HuginnBuilder, HuginnError, LanguageModelHost, ModelSession,
    ProviderDescriptor, Result, SessionConfig, SharedSession,
};

/// Counters and knobs shared between a host and every session it creates.
#[derive(Default)]
pub struct Shared {
    pub response: Mutex<String>,
    pub last_prompt: Mutex<Option<String>>,
    pub prompt_delay: Mutex<Duration>,
    /// Remaining prompts that fail with a transient HTTP error.
    pub transient_failures: AtomicUsize,
    pub prompts: AtomicUsize,
    pub destroyed: AtomicUsize,
}

pub struct MockHost {
    availability: Mutex<Availability>,
    create_delay: Mutex<Duration>,
    fail_create: AtomicBool,
    progress: Mutex<Vec<f64>>,
    pub probes: AtomicUsize,
    pub creates: AtomicUsize,
    pub shared: Arc<Shared>,
}

impl MockHost {
    pub fn new(availability: Availability) -> Arc<Self> {
        Arc::new(Self {
            availability: Mutex::new(availability),
            create_delay: Mutex::new(Duration::ZERO),
            fail_create: AtomicBool::new(false),
            progress: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            shared: Arc::new(Shared::default()),
        })
    }

    /// A ready host answering every prompt with `response`.
    pub fn ready(response: &str) -> Arc<Self> {
        let host = Self::new(Availability::Ready);
        host.set_response(response);
        host
    }

    pub fn set_availability(&self, availability: Availability) {
        *self.availability.lock().unwrap() = availability;
    }

    pub fn set_response(&self, response: &str) {
        *self.shared.response.lock().unwrap() = response.to_string();
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = delay;
    }

    pub fn set_prompt_delay(&self, delay: Duration) {
        *self.shared.prompt_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_progress(&self, steps: &[f64]) {
        *self.progress.lock().unwrap() = steps.to_vec();
    }

    pub fn fail_next_prompts(&self, n: usize) {
        self.shared.transient_failures.store(n, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> usize {
        self.shared.prompts.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.shared.destroyed.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.shared.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModelHost for MockHost {
    fn name(&self) -> &str {
        "mock"
    }

    async fn availability(&self) -> Availability {
        self.probes.fetch_add(1, Ordering::SeqCst);
        *self.availability.lock().unwrap()
    }

    async fn create(&self, config: SessionConfig) -> Result<Box<dyn ModelSession>> {
        self.creates.fetch_add(1, Ordering::SeqCst);

        let steps = self.progress.lock().unwrap().clone();
        if let Some(monitor) = &config.monitor {
            for step in steps {
                monitor.report(step);
            }
        }

        let delay = *self.create_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(HuginnError::SessionCreation {
                provider: "mock".into(),
                message: "model download failed".into(),
            });
        }

        Ok(Box::new(MockSession::with_shared(Arc::clone(&self.shared))))
    }
}

pub struct MockSession {
    shared: Arc<Shared>,
    destroyed: AtomicBool,
    destroy_delay: Duration,
}

impl MockSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_shared(Arc::new(Shared::default())))
    }

    /// A session whose teardown takes `delay` before it is marked destroyed.
    pub fn with_destroy_delay(delay: Duration) -> Arc<Self> {
        let mut session = Self::with_shared(Arc::new(Shared::default()));
        session.destroy_delay = delay;
        Arc::new(session)
    }

    fn with_shared(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            destroyed: AtomicBool::new(false),
            destroy_delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl ModelSession for MockSession {
    async fn prompt(&self, text: &str) -> Result<String> {
        if self.is_destroyed() {
            return Err(HuginnError::SessionDestroyed);
        }
        self.shared.prompts.fetch_add(1, Ordering::SeqCst);
        *self.shared.last_prompt.lock().unwrap() = Some(text.to_string());

        let delay = *self.shared.prompt_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .shared
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(HuginnError::Http("connection reset".into()));
        }

        Ok(self.shared.response.lock().unwrap().clone())
    }

    async fn destroy(&self) {
        if !self.destroy_delay.is_zero() {
            tokio::time::sleep(self.destroy_delay).await;
        }
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.shared.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// A fresh standalone session as the cache stores it.
pub fn session() -> SharedSession {
    MockSession::new()
}

/// Builder with `host` registered as provider "mock" at priority 0.
pub fn builder_with(host: &Arc<MockHost>) -> HuginnBuilder {
    Huginn::builder().host(ProviderDescriptor::new("mock", 0), host.clone())
}
