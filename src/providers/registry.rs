//! Provider registry with priority-ordered selection.
//!
//! The `ProviderRegistry` stores providers sorted by ascending priority
//! (ties broken by registration order). Selection probes each provider's
//! availability in that order.
//!
//! # Selection
//!
//! ```text
//! select_best()
//!      │ probe in priority order
//!      ▼
//! ┌──────────────────┐
//! │ A (priority 1)   │ ──► Unavailable: remember, continue
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ B (priority 2)   │ ──► Downloading: remember as first candidate, continue
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ C (priority 3)   │ ──► Ready: selected
//! └──────────────────┘
//! ```
//!
//! The first `Ready` provider wins. If none is ready, the first
//! `Downloading` one is chosen so its download can proceed. If every
//! provider is `Unavailable` the outcome of each probe is reported in
//! [`HuginnError::ProviderUnavailable`].

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::Provider;
use crate::error::ProbeOutcome;
use crate::telemetry;
use crate::types::{Availability, Capability, ProviderStatus};
use crate::{HuginnError, Result};

/// Registry of providers in selection order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider.
    ///
    /// Providers with equal priority keep registration order. A second
    /// provider with an already registered name is rejected.
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<()> {
        if self.get(provider.name()).is_some() {
            return Err(HuginnError::Configuration(format!(
                "provider '{}' is already registered",
                provider.name()
            )));
        }
        let priority = provider.descriptor().priority;
        // insert after every provider with priority <= ours
        let index = self
            .providers
            .partition_point(|p| p.descriptor().priority <= priority);
        self.providers.insert(index, provider);
        Ok(())
    }

    /// Probe providers in order and return the best available one.
    #[instrument(skip(self), fields(candidates = self.providers.len()))]
    pub async fn select_best(&self) -> Result<Arc<dyn Provider>> {
        if self.providers.is_empty() {
            return Err(HuginnError::NoProvider);
        }

        let mut probed = Vec::with_capacity(self.providers.len());
        let mut downloading: Option<&Arc<dyn Provider>> = None;

        for provider in &self.providers {
            let availability = provider.check_availability().await;
            Self::record_probe(provider.name(), availability);
            debug!(provider = provider.name(), %availability, "probed provider");

            match availability {
                Availability::Ready => {
                    info!(provider = provider.name(), "selected ready provider");
                    return Ok(Arc::clone(provider));
                }
                Availability::Downloading if downloading.is_none() => {
                    downloading = Some(provider);
                }
                _ => {}
            }
            probed.push(ProbeOutcome {
                provider: provider.name().to_string(),
                availability,
            });
        }

        match downloading {
            Some(provider) => {
                info!(provider = provider.name(), "selected provider pending download");
                Ok(Arc::clone(provider))
            }
            None => Err(HuginnError::ProviderUnavailable { probed }),
        }
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Provider names in selection order.
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Providers in selection order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Whether any registered provider declares `capability`.
    pub fn supports(&self, capability: Capability) -> bool {
        self.providers
            .iter()
            .any(|p| p.descriptor().supports(capability))
    }

    /// Descriptor summaries in selection order.
    pub fn statuses(&self, active: Option<&str>) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|p| p.descriptor().status(active == Some(p.name())))
            .collect()
    }

    /// Drop every provider.
    pub fn clear(&mut self) {
        self.providers.clear();
    }

    fn record_probe(provider: &str, availability: Availability) {
        metrics::counter!(telemetry::PROVIDER_PROBES_TOTAL,
            "provider" => provider.to_owned(),
            "availability" => availability.as_str(),
        )
        .increment(1);
    }
}
