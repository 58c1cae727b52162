//! Huginn - LLM orchestration for in-page prompt assistance
//!
//! This crate sits between a writing-assistant UI and a generative model
//! exposed by the host. It selects a provider by priority and availability,
//! reuses expensive model sessions under strict key and TTL rules, and turns
//! free-form model output into typed results without ever failing the UI.
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{FieldContext, Huginn, OllamaHost, ProviderDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let assistant = Huginn::builder()
//!         .ollama(ProviderDescriptor::new("local", 0), OllamaHost::new("llama3.2"))
//!         .build()?;
//!
//!     let result = assistant
//!         .analyze_prompt("write something about dogs", &FieldContext::new("textarea"))
//!         .await?;
//!
//!     println!("vagueness {}/10", result.vagueness_score);
//!     for suggestion in &result.suggestions {
//!         println!("- {suggestion}");
//!     }
//!
//!     assistant.destroy().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod extract;
pub mod host;
pub mod interpret;
pub mod prompts;
pub mod providers;
pub mod service;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use cache::{SessionCache, SessionCacheConfig, SessionKey};
pub use error::{HuginnError, ProbeOutcome, Result};
pub use host::{
    DownloadProgress, LanguageModelHost, ModelSession, ProgressMonitor, ProgressStream,
    SessionConfig, SharedSession, progress_channel,
};
pub use providers::{
    HostModelProvider, Provider, ProviderDescriptor, ProviderRegistry, ProviderTuning,
    RetryConfig, SessionRequest,
};
pub use service::{Assistant, Huginn, HuginnBuilder, ProgressEvent, PromptLimits};

#[cfg(feature = "ollama")]
pub use host::{OllamaHost, OllamaSession};

// Re-export all types
pub use types::{
    AnalysisResult, Availability, CacheStats, Capability, ClarifyingAnswer, FieldContext, Message,
    Metadata, OptimizationResult, PageContext, ProviderStatus, QuestionResult, Role,
    SessionStats, StatusSnapshot,
};
