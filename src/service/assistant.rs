//! The orchestrator.
//!
//! [`Assistant`] owns the provider registry, the cached active provider and
//! a session cache. Every operation follows the same path:
//!
//! ```text
//! validate input ─► active provider (select on first use)
//!                 ─► session for (provider, system prompt)
//!                 ─► prompt (retry on transient errors)
//!                 ─► extract + interpret
//!                 ─► typed result
//! ```
//!
//! Only input validation is returned as an `Err`. Anything that goes wrong
//! after that becomes a `success: false` result, so the UI always has
//! something to render.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, instrument, warn};

use super::PromptLimits;
use crate::cache::SessionCache;
use crate::host::{
    DEFAULT_PROGRESS_BUFFER, DownloadProgress, ProgressStream, SharedSession, progress_channel,
};
use crate::providers::retry::with_retry;
use crate::providers::{Provider, ProviderRegistry, RetryConfig, SessionRequest};
use crate::telemetry;
use crate::types::{
    AnalysisResult, Availability, Capability, ClarifyingAnswer, FieldContext, Metadata,
    OptimizationResult, PageContext, QuestionResult, StatusSnapshot,
};
use crate::{HuginnError, Result, interpret, prompts};

/// Download progress re-published from session creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub provider: String,
    /// Fraction downloaded, in `[0, 1]`.
    pub loaded: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Analyze,
    AnalyzePage,
    Questions,
    Optimize,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Analyze => "analyze",
            Operation::AnalyzePage => "analyze_page",
            Operation::Questions => "questions",
            Operation::Optimize => "optimize",
        }
    }

    fn capability(self) -> Capability {
        match self {
            Operation::Analyze => Capability::Analysis,
            Operation::AnalyzePage => Capability::ContextAnalysis,
            Operation::Questions => Capability::Questions,
            Operation::Optimize => Capability::Optimization,
        }
    }
}

/// Prompt assistant orchestrator. Build one with
/// [`Huginn::builder()`](super::Huginn::builder).
pub struct Assistant {
    registry: RwLock<ProviderRegistry>,
    active: Mutex<Option<Arc<dyn Provider>>>,
    sessions: SessionCache,
    limits: PromptLimits,
    operation_timeout: Duration,
    retry: RetryConfig,
    progress: broadcast::Sender<ProgressEvent>,
}

impl Assistant {
    pub(crate) fn new(
        registry: ProviderRegistry,
        sessions: SessionCache,
        limits: PromptLimits,
        operation_timeout: Duration,
        retry: RetryConfig,
        progress_buffer: usize,
    ) -> Self {
        let (progress, _) = broadcast::channel(progress_buffer.max(1));
        Self {
            registry: RwLock::new(registry),
            active: Mutex::new(None),
            sessions,
            limits,
            operation_timeout,
            retry,
            progress,
        }
    }

    pub fn limits(&self) -> PromptLimits {
        self.limits
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// The orchestrator's session cache.
    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// Receive download progress for sessions this assistant creates.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    // ========================================================================
    // Provider selection
    // ========================================================================

    /// Probe registered providers and return the best one.
    ///
    /// Does not change the active provider.
    pub async fn select_best_provider(&self) -> Result<Arc<dyn Provider>> {
        self.registry.read().await.select_best().await
    }

    /// Return the active provider, selecting one on first use.
    ///
    /// Concurrent callers wait for a single selection.
    pub async fn get_or_select_provider(&self) -> Result<Arc<dyn Provider>> {
        let mut active = self.active.lock().await;
        if let Some(provider) = active.as_ref() {
            return Ok(Arc::clone(provider));
        }
        let selected = self.select_best_provider().await?;
        *active = Some(Arc::clone(&selected));
        Ok(selected)
    }

    /// Forget the active provider and select again.
    #[instrument(skip(self))]
    pub async fn refresh_providers(&self) -> Result<Arc<dyn Provider>> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            info!(provider = previous.name(), "cleared active provider");
        }
        let selected = self.select_best_provider().await?;
        *active = Some(Arc::clone(&selected));
        Ok(selected)
    }

    /// Name of the active provider, if one is selected.
    pub async fn active_provider(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|p| p.name().to_string())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Analyse a prompt for vagueness and suggest a rewrite.
    #[instrument(skip_all, fields(operation = "analyze"))]
    pub async fn analyze_prompt(
        &self,
        prompt: &str,
        field: &FieldContext,
    ) -> Result<AnalysisResult> {
        let prompt = self.limits.validate(prompt)?;
        let start = Instant::now();
        let message = prompts::analysis_message(prompt, field);

        let outcome = self
            .converse(Operation::Analyze, prompts::ANALYSIS_SYSTEM_PROMPT, &message)
            .await
            .and_then(|(provider, raw)| interpret::analysis(&raw, prompt, &provider));
        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => AnalysisResult::failure(&Self::failed(Operation::Analyze, e)),
        };

        Self::record(
            Operation::Analyze,
            start,
            result.success,
            &result.provider,
            &mut result.metadata,
        );
        Ok(result)
    }

    /// Analyse a prompt with the surrounding page as extra context.
    #[instrument(skip_all, fields(operation = "analyze_page"))]
    pub async fn analyze_with_page_context(
        &self,
        prompt: &str,
        field: &FieldContext,
        page: &PageContext,
    ) -> Result<AnalysisResult> {
        let prompt = self.limits.validate(prompt)?;
        let start = Instant::now();
        let message = prompts::page_analysis_message(prompt, field, page);

        let outcome = self
            .converse(Operation::AnalyzePage, prompts::ANALYSIS_SYSTEM_PROMPT, &message)
            .await
            .and_then(|(provider, raw)| interpret::analysis(&raw, prompt, &provider));
        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => AnalysisResult::failure(&Self::failed(Operation::AnalyzePage, e)),
        };

        Self::record(
            Operation::AnalyzePage,
            start,
            result.success,
            &result.provider,
            &mut result.metadata,
        );
        Ok(result)
    }

    /// Ask the model which questions would make the prompt more precise.
    #[instrument(skip_all, fields(operation = "questions"))]
    pub async fn generate_clarifying_questions(
        &self,
        prompt: &str,
        field: &FieldContext,
    ) -> Result<QuestionResult> {
        let prompt = self.limits.validate(prompt)?;
        let start = Instant::now();
        let message = prompts::questions_message(prompt, field);

        let outcome = self
            .converse(Operation::Questions, prompts::QUESTIONS_SYSTEM_PROMPT, &message)
            .await
            .and_then(|(provider, raw)| interpret::questions(&raw, &provider));
        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => QuestionResult::failure(&Self::failed(Operation::Questions, e)),
        };

        Self::record(
            Operation::Questions,
            start,
            result.success,
            &result.provider,
            &mut result.metadata,
        );
        Ok(result)
    }

    /// Rewrite a prompt using the author's answers to clarifying questions.
    #[instrument(skip_all, fields(operation = "optimize", answers = answers.len()))]
    pub async fn optimize_with_context(
        &self,
        prompt: &str,
        answers: &[ClarifyingAnswer],
        field: &FieldContext,
    ) -> Result<OptimizationResult> {
        let prompt = self.limits.validate(prompt)?;
        let start = Instant::now();
        let message = prompts::optimization_message(prompt, answers, field);

        let outcome = self
            .converse(Operation::Optimize, prompts::OPTIMIZATION_SYSTEM_PROMPT, &message)
            .await
            .and_then(|(provider, raw)| interpret::optimization(&raw, prompt, &provider));
        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => OptimizationResult::failure(&Self::failed(Operation::Optimize, e)),
        };

        Self::record(
            Operation::Optimize,
            start,
            result.success,
            &result.provider,
            &mut result.metadata,
        );
        Ok(result)
    }

    // ========================================================================
    // Introspection and teardown
    // ========================================================================

    /// Point-in-time view of providers, the active selection and the cache.
    pub async fn status(&self) -> StatusSnapshot {
        let active = self.active_provider().await;
        let registry = self.registry.read().await;
        let features = Capability::all()
            .into_iter()
            .filter(|c| registry.supports(*c))
            .map(|c| c.as_str().to_string())
            .collect();

        StatusSnapshot {
            providers: registry.statuses(active.as_deref()),
            active_provider: active,
            cache: self.sessions.stats(),
            features,
        }
    }

    /// Tear down every provider, then the session cache, then forget all
    /// providers. Later operations fail with `NoProvider`.
    #[instrument(skip(self))]
    pub async fn destroy(&self) {
        {
            let registry = self.registry.read().await;
            for provider in registry.iter() {
                provider.destroy().await;
            }
        }
        self.sessions.destroy_all().await;
        self.registry.write().await.clear();
        *self.active.lock().await = None;
        info!("assistant destroyed");
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Run one prompt/response exchange within the operation timeout.
    ///
    /// Returns the provider name and the raw model output.
    async fn converse(
        &self,
        operation: Operation,
        system_prompt: &'static str,
        message: &str,
    ) -> Result<(String, String)> {
        let budget = self.operation_timeout;
        tokio::time::timeout(budget, self.exchange(operation, system_prompt, message))
            .await
            .unwrap_or_else(|_| {
                Err(HuginnError::OperationTimeout {
                    operation: operation.as_str(),
                    budget,
                })
            })
    }

    async fn exchange(
        &self,
        operation: Operation,
        system_prompt: &'static str,
        message: &str,
    ) -> Result<(String, String)> {
        let provider = self.get_or_select_provider().await?;
        if !provider.descriptor().supports(operation.capability()) {
            return Err(HuginnError::Unsupported);
        }

        let session = match self.session_for(&provider, system_prompt).await {
            Ok(session) => session,
            Err(e) => {
                self.reprobe(&provider).await;
                return Err(e);
            }
        };

        let raw = with_retry(&self.retry, provider.name(), operation.as_str(), || {
            session.prompt(message)
        })
        .await?;
        debug!(provider = provider.name(), chars = raw.len(), "model responded");
        Ok((provider.name().to_string(), raw))
    }

    async fn session_for(
        &self,
        provider: &Arc<dyn Provider>,
        system_prompt: &'static str,
    ) -> Result<SharedSession> {
        let creator = Arc::clone(provider);
        let progress = self.progress.clone();
        self.sessions
            .get_or_create(provider.name(), system_prompt, move || {
                let (monitor, stream) = progress_channel(DEFAULT_PROGRESS_BUFFER);
                tokio::spawn(forward_progress(
                    creator.name().to_string(),
                    stream,
                    progress,
                ));
                async move {
                    creator
                        .create_session(SessionRequest::new(system_prompt).monitor(monitor))
                        .await
                }
            })
            .await
    }

    /// After a failed session creation, drop the active provider if it now
    /// reports itself unavailable.
    async fn reprobe(&self, provider: &Arc<dyn Provider>) {
        if provider.check_availability().await != Availability::Unavailable {
            return;
        }
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|a| a.name() == provider.name()) {
            warn!(provider = provider.name(), "active provider became unavailable");
            *active = None;
        }
    }

    fn failed(operation: Operation, err: HuginnError) -> HuginnError {
        warn!(operation = operation.as_str(), error = %err, "operation failed");
        err
    }

    /// Stamp operation metadata and record outcome metrics.
    fn record(
        operation: Operation,
        start: Instant,
        success: bool,
        provider: &str,
        metadata: &mut Metadata,
    ) {
        let elapsed = start.elapsed();
        metadata.insert("operation", operation.as_str());
        metadata.insert("durationMs", elapsed.as_millis() as u64);

        let status = if success { "ok" } else { "error" };
        metrics::counter!(telemetry::OPERATIONS_TOTAL,
            "provider" => provider.to_owned(),
            "operation" => operation.as_str(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::OPERATION_DURATION_SECONDS,
            "operation" => operation.as_str(),
        )
        .record(elapsed.as_secs_f64());
    }
}

async fn forward_progress(
    provider: String,
    mut stream: ProgressStream,
    progress: broadcast::Sender<ProgressEvent>,
) {
    while let Some(DownloadProgress { loaded }) = stream.next().await {
        debug!(provider = %provider, loaded, "download progress");
        // no subscribers is not an error
        let _ = progress.send(ProgressEvent {
            provider: provider.clone(),
            loaded,
        });
    }
}
