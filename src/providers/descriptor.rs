//! Static provider descriptors

use std::collections::BTreeSet;
use std::time::Duration;

use crate::types::{Capability, ProviderStatus};

/// Per-provider hints for the adapter's own session cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderTuning {
    /// Override for the session time-to-live.
    pub session_ttl: Option<Duration>,
    /// Override for the maximum number of cached sessions.
    pub max_sessions: Option<usize>,
}

/// Immutable description of a registered provider.
///
/// Lower `priority` values are tried first during selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub name: String,
    pub priority: u32,
    pub capabilities: BTreeSet<Capability>,
    pub requires_auth: bool,
    pub tuning: ProviderTuning,
    /// Name of a provider to fall back to. Carried for introspection only;
    /// selection never follows it.
    pub fallback_to: Option<String>,
}

impl ProviderDescriptor {
    /// Descriptor declaring every capability, with no auth and default tuning.
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            capabilities: Capability::all(),
            requires_auth: false,
            tuning: ProviderTuning::default(),
            fallback_to: None,
        }
    }

    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.tuning.session_ttl = Some(ttl);
        self
    }

    pub fn max_sessions(mut self, n: usize) -> Self {
        self.tuning.max_sessions = Some(n);
        self
    }

    pub fn fallback_to(mut self, name: impl Into<String>) -> Self {
        self.fallback_to = Some(name.into());
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub(crate) fn status(&self, active: bool) -> ProviderStatus {
        ProviderStatus {
            name: self.name.clone(),
            priority: self.priority,
            capabilities: self.capabilities.iter().copied().collect(),
            requires_auth: self.requires_auth,
            fallback_to: self.fallback_to.clone(),
            active,
        }
    }
}
