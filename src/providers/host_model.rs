//! Provider adapter over a host model capability.
//!
//! [`HostModelProvider`] wraps any [`LanguageModelHost`] behind the
//! [`Provider`] contract. It keeps its own [`SessionCache`] for
//! [`Provider::analyze`], sized by the descriptor's tuning hints. On
//! [`Provider::destroy`] it releases those sessions along with any still
//! alive that [`Provider::create_session`] handed out.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::retry::{RetryConfig, with_retry};
use super::{Provider, ProviderDescriptor, SessionRequest};
use crate::Result;
use crate::cache::{SessionCache, SessionCacheConfig};
use crate::host::{LanguageModelHost, ModelSession, ProgressMonitor, SessionConfig, SharedSession};
use crate::types::{AnalysisResult, Availability, FieldContext};
use crate::{interpret, prompts};

/// [`Provider`] backed by a [`LanguageModelHost`].
pub struct HostModelProvider {
    descriptor: ProviderDescriptor,
    host: Arc<dyn LanguageModelHost>,
    sessions: SessionCache,
    /// Sessions returned by `create_session`, owned by the caller.
    handed_out: Mutex<Vec<Weak<dyn ModelSession>>>,
    retry: RetryConfig,
}

impl HostModelProvider {
    pub fn new(descriptor: ProviderDescriptor, host: Arc<dyn LanguageModelHost>) -> Self {
        let mut cache = SessionCacheConfig::default();
        if let Some(ttl) = descriptor.tuning.session_ttl {
            cache = cache.ttl(ttl);
        }
        if let Some(max) = descriptor.tuning.max_sessions {
            cache = cache.max_sessions(max);
        }
        Self {
            descriptor,
            host,
            sessions: SessionCache::new(cache),
            handed_out: Mutex::new(Vec::new()),
            retry: RetryConfig::default(),
        }
    }

    /// Set the retry policy for prompt calls made by [`Provider::analyze`].
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The adapter's own session cache.
    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    async fn run_analysis(
        &self,
        prompt: &str,
        field: &FieldContext,
        monitor: Option<ProgressMonitor>,
    ) -> Result<AnalysisResult> {
        let host = Arc::clone(&self.host);
        let request = SessionRequest {
            system_prompt: prompts::ANALYSIS_SYSTEM_PROMPT.to_string(),
            monitor,
        };
        let session = self
            .sessions
            .get_or_create(self.name(), prompts::ANALYSIS_SYSTEM_PROMPT, move || {
                create_with(host, request)
            })
            .await?;

        let message = prompts::analysis_message(prompt, field);
        let raw = with_retry(&self.retry, self.name(), "analyze", || {
            session.prompt(&message)
        })
        .await?;
        interpret::analysis(&raw, prompt, self.name())
    }
}

async fn create_with(
    host: Arc<dyn LanguageModelHost>,
    request: SessionRequest,
) -> Result<SharedSession> {
    let config = SessionConfig::with_system_prompt(request.system_prompt).monitor(request.monitor);
    let session = host.create(config).await?;
    Ok(Arc::from(session))
}

#[async_trait]
impl Provider for HostModelProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn check_availability(&self) -> Availability {
        let availability = self.host.availability().await;
        debug!(
            provider = %self.descriptor.name,
            host = self.host.name(),
            %availability,
            "probed host"
        );
        availability
    }

    async fn create_session(&self, request: SessionRequest) -> Result<SharedSession> {
        let session = create_with(Arc::clone(&self.host), request).await?;
        let mut handed_out = self.handed_out.lock().unwrap_or_else(PoisonError::into_inner);
        handed_out.retain(|weak| weak.strong_count() > 0);
        handed_out.push(Arc::downgrade(&session));
        Ok(session)
    }

    #[instrument(skip(self, prompt, field, monitor), fields(provider = %self.descriptor.name))]
    async fn analyze(
        &self,
        prompt: &str,
        field: &FieldContext,
        monitor: Option<ProgressMonitor>,
    ) -> AnalysisResult {
        let start = Instant::now();
        match self.run_analysis(prompt, field, monitor).await {
            Ok(mut result) => {
                result
                    .metadata
                    .insert("durationMs", start.elapsed().as_millis() as u64);
                result
            }
            Err(e) => {
                warn!(error = %e, "analysis failed");
                AnalysisResult::failure(&e)
            }
        }
    }

    async fn destroy(&self) {
        let live: Vec<SharedSession> = self
            .handed_out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .filter_map(|weak| weak.upgrade())
            .collect();
        for session in live {
            session.destroy().await;
        }
        self.sessions.destroy_all().await;
    }
}
