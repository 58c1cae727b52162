//! Host model capability contract.
//!
//! The host environment exposes a generative model as an opaque capability:
//! an availability check, session creation (which may trigger a download),
//! and a prompt/response call on the resulting session. Provider adapters
//! in [`crate::providers`] are written against these traits only.

mod progress;

#[cfg(feature = "ollama")]
pub mod ollama;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;

use crate::Result;
use crate::types::{Availability, Message};

pub use progress::{
    DEFAULT_PROGRESS_BUFFER, DownloadProgress, ProgressMonitor, ProgressStream, progress_channel,
};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaHost, OllamaSession};

/// A session handle shared between the cache and its callers.
pub type SharedSession = Arc<dyn ModelSession>;

/// Stream of incremental response text.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Configuration passed to [`LanguageModelHost::create`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Role-tagged messages that seed the session, in order.
    pub initial_prompts: Vec<Message>,
    /// Receives download progress while creation is pending.
    pub monitor: Option<ProgressMonitor>,
}

impl SessionConfig {
    /// Session seeded with a single system prompt.
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            initial_prompts: vec![Message::system(system_prompt)],
            monitor: None,
        }
    }

    pub fn monitor(mut self, monitor: Option<ProgressMonitor>) -> Self {
        self.monitor = monitor;
        self
    }
}

/// A generative model capability provided by the host.
#[async_trait]
pub trait LanguageModelHost: Send + Sync {
    /// Host name for logging/debugging.
    fn name(&self) -> &str;

    /// Current readiness. Expected absence is reported as
    /// [`Availability::Unavailable`], never as an error.
    async fn availability(&self) -> Availability;

    /// Create a session. May suspend for a long time while model assets
    /// download, reporting progress through `config.monitor`.
    async fn create(&self, config: SessionConfig) -> Result<Box<dyn ModelSession>>;
}

/// A live session bound to its initial prompts.
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Send one prompt and wait for the full response.
    async fn prompt(&self, text: &str) -> Result<String>;

    /// Send one prompt and receive the response incrementally.
    ///
    /// Default implementation yields the full response as a single chunk.
    async fn prompt_streaming(&self, text: &str) -> Result<TextStream> {
        let response = self.prompt(text).await?;
        Ok(Box::pin(futures_util::stream::once(async move {
            Ok(response)
        })))
    }

    /// Release the session. Idempotent.
    async fn destroy(&self);

    /// Whether [`destroy`](Self::destroy) has been called.
    fn is_destroyed(&self) -> bool;
}
