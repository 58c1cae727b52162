//! Provider contract.
//!
//! A provider wraps one concrete model capability behind a uniform
//! contract: availability, session creation, a single-shot analysis and
//! teardown. The assistant only ever sees `Arc<dyn Provider>`.
//!
//! # Availability semantics
//!
//! Expected absence is a state, not an error:
//! - `Unavailable`: the capability is absent on this host
//! - `Downloading`: a one-time asset fetch is required or in progress
//! - `Ready`: sessions can be created immediately
//!
//! Availability is computed on every call and never cached; each selection
//! cycle re-probes.

use async_trait::async_trait;

use super::ProviderDescriptor;
use crate::Result;
use crate::host::{ProgressMonitor, SharedSession};
use crate::types::{AnalysisResult, Availability, FieldContext};

/// Parameters for [`Provider::create_session`].
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub system_prompt: String,
    /// Receives download progress in `[0, 1]` while creation is pending.
    pub monitor: Option<ProgressMonitor>,
}

impl SessionRequest {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            monitor: None,
        }
    }

    pub fn monitor(mut self, monitor: ProgressMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }
}

/// A model capability behind the uniform provider contract.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Static descriptor, fixed at registration.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Provider name for logging/debugging.
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Probe current readiness. Never fails.
    async fn check_availability(&self) -> Availability;

    /// Create a session seeded with `request.system_prompt`.
    ///
    /// Not assumed idempotent: callers must not invoke it concurrently for
    /// the same system prompt. [`SessionCache`](crate::SessionCache)
    /// guarantees this.
    async fn create_session(&self, request: SessionRequest) -> Result<SharedSession>;

    /// Run one full analysis, reusing sessions internally.
    ///
    /// Expected failures become `success: false` results; this never
    /// returns an error.
    async fn analyze(
        &self,
        prompt: &str,
        field: &FieldContext,
        monitor: Option<ProgressMonitor>,
    ) -> AnalysisResult;

    /// Release every session this provider created. Idempotent.
    async fn destroy(&self);
}
