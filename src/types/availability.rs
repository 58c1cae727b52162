//! Provider availability states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tri-state readiness of a provider's underlying model capability.
///
/// Computed on demand; never cached across selection cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// The model can serve prompts immediately.
    Ready,
    /// A one-time asset fetch is required or in progress.
    Downloading,
    /// The capability is not present in the host at all.
    Unavailable,
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Ready => "ready",
            Availability::Downloading => "downloading",
            Availability::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
