//! Huginn error types

use std::fmt;
use std::time::Duration;

use crate::types::Availability;

/// Outcome of probing a single provider during selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub provider: String,
    pub availability: Availability,
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.provider, self.availability)
    }
}

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Usage errors (raised before any provider activity)
    #[error("invalid input: {0}")]
    InputValidation(String),

    // Orchestration errors
    #[error("no language model provider is available (probed: {})", format_probes(.probed))]
    ProviderUnavailable { probed: Vec<ProbeOutcome> },

    #[error("failed to create session with provider '{provider}': {message}")]
    SessionCreation { provider: String, message: String },

    #[error("could not extract a structured response from model output: {excerpt:?}")]
    ResponseParse { excerpt: String },

    #[error("{operation} did not complete within {budget:?}")]
    OperationTimeout {
        operation: &'static str,
        budget: Duration,
    },

    #[error("session has been destroyed")]
    SessionDestroyed,

    // Host/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty response from model")]
    EmptyResponse,

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider does not support this operation")]
    Unsupported,
}

fn format_probes(probed: &[ProbeOutcome]) -> String {
    if probed.is_empty() {
        return "none registered".to_string();
    }
    probed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl HuginnError {
    /// Whether this error is worth retrying.
    ///
    /// Transport failures, rate limits and server-side (5xx) errors are
    /// transient. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            HuginnError::Http(_) => true,
            HuginnError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Stable snake_case tag for result metadata and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            HuginnError::InputValidation(_) => "input_validation",
            HuginnError::ProviderUnavailable { .. } => "provider_unavailable",
            HuginnError::SessionCreation { .. } => "session_creation",
            HuginnError::ResponseParse { .. } => "response_parse",
            HuginnError::OperationTimeout { .. } => "operation_timeout",
            HuginnError::SessionDestroyed => "session_destroyed",
            HuginnError::Http(_) => "http",
            HuginnError::Api { .. } => "api",
            HuginnError::Json(_) => "json",
            HuginnError::EmptyResponse => "empty_response",
            HuginnError::NoProvider => "no_provider",
            HuginnError::Configuration(_) => "configuration",
            HuginnError::Unsupported => "unsupported",
        }
    }

    /// Human-readable remediation hints shown alongside a failed result.
    pub fn remediation(&self) -> Vec<String> {
        let hints: &[&str] = match self {
            HuginnError::InputValidation(_) => &["Adjust the prompt length and try again."],
            HuginnError::ProviderUnavailable { .. } | HuginnError::NoProvider => &[
                "Check that a local language model is installed and enabled.",
                "Refresh providers once the model runtime is running.",
            ],
            HuginnError::SessionCreation { .. } => &[
                "The model may still be downloading; wait for the download to finish.",
                "Make sure there is enough disk space for the model files.",
            ],
            HuginnError::ResponseParse { .. } | HuginnError::EmptyResponse => &[
                "The model returned an unexpected answer; try again.",
                "Rephrasing the prompt can help the model respond in the expected format.",
            ],
            HuginnError::OperationTimeout { .. } => &[
                "The model took too long to respond; try again shortly.",
                "Shorter prompts are processed faster.",
            ],
            HuginnError::SessionDestroyed => &["The session was closed; retry the operation."],
            HuginnError::Http(_) | HuginnError::Api { .. } => &[
                "The model runtime could not be reached; check that it is running.",
            ],
            HuginnError::Json(_) | HuginnError::Configuration(_) | HuginnError::Unsupported => {
                &["Check the assistant configuration."]
            }
        };
        hints.iter().map(|s| s.to_string()).collect()
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
