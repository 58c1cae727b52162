//! Builder for configuring assistant instances

use std::sync::Arc;
use std::time::Duration;

use super::{Assistant, PromptLimits};
use crate::cache::{SessionCache, SessionCacheConfig};
use crate::host::LanguageModelHost;
use crate::providers::{
    HostModelProvider, Provider, ProviderDescriptor, ProviderRegistry, RetryConfig,
};
use crate::{HuginnError, Result};

#[cfg(feature = "ollama")]
use crate::host::OllamaHost;

/// Default per-operation timeout.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default capacity of the progress broadcast channel.
pub const DEFAULT_PROGRESS_CHANNEL: usize = 64;

/// Main entry point for creating assistant instances.
pub struct Huginn;

impl Huginn {
    /// Create a new builder for configuring the assistant.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }
}

enum PendingProvider {
    Ready(Arc<dyn Provider>),
    Host(ProviderDescriptor, Arc<dyn LanguageModelHost>),
}

/// Builder for configuring assistant instances.
///
/// Providers are registered in call order; equal priorities keep that order
/// during selection.
pub struct HuginnBuilder {
    providers: Vec<PendingProvider>,
    cache: SessionCacheConfig,
    limits: PromptLimits,
    operation_timeout: Duration,
    retry: RetryConfig,
    progress_buffer: usize,
}

impl Default for HuginnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            cache: SessionCacheConfig::default(),
            limits: PromptLimits::default(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            retry: RetryConfig::default(),
            progress_buffer: DEFAULT_PROGRESS_CHANNEL,
        }
    }

    /// Register a provider implementation.
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(PendingProvider::Ready(provider));
        self
    }

    /// Register a host capability, wrapped in a [`HostModelProvider`].
    ///
    /// The adapter inherits the builder's retry policy.
    pub fn host(
        mut self,
        descriptor: ProviderDescriptor,
        host: Arc<dyn LanguageModelHost>,
    ) -> Self {
        self.providers.push(PendingProvider::Host(descriptor, host));
        self
    }

    /// Register an Ollama server as a provider.
    #[cfg(feature = "ollama")]
    pub fn ollama(self, descriptor: ProviderDescriptor, host: OllamaHost) -> Self {
        self.host(descriptor, Arc::new(host))
    }

    /// Configure the orchestrator's session cache.
    pub fn cache(mut self, config: SessionCacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn limits(mut self, limits: PromptLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn min_prompt_length(mut self, n: usize) -> Self {
        self.limits.min_prompt_length = n;
        self
    }

    pub fn max_prompt_length(mut self, n: usize) -> Self {
        self.limits.max_prompt_length = n;
        self
    }

    /// Set the per-operation timeout (default: 60s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the retry policy for prompt calls.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Set the capacity of the progress broadcast channel.
    pub fn progress_buffer(mut self, capacity: usize) -> Self {
        self.progress_buffer = capacity;
        self
    }

    /// Apply a loaded configuration file.
    #[cfg(feature = "cli")]
    pub fn from_config(mut self, config: &crate::config::Config) -> Self {
        use crate::config::ProviderConfig;

        self = self
            .limits(config.assistant.limits())
            .timeout(config.assistant.operation_timeout())
            .cache(config.cache.session_cache_config())
            .retry(config.retry.retry_config());
        for provider in &config.providers {
            self = match provider {
                ProviderConfig::Ollama(ollama) => self.ollama(ollama.descriptor(), ollama.host()),
            };
        }
        self
    }

    /// Build the assistant.
    pub fn build(self) -> Result<Assistant> {
        if self.providers.is_empty() {
            return Err(HuginnError::NoProvider);
        }
        self.limits.check()?;
        if self.operation_timeout.is_zero() {
            return Err(HuginnError::Configuration(
                "operation timeout must be greater than zero".to_string(),
            ));
        }

        let mut registry = ProviderRegistry::new();
        for pending in self.providers {
            let provider: Arc<dyn Provider> = match pending {
                PendingProvider::Ready(provider) => provider,
                PendingProvider::Host(descriptor, host) => Arc::new(
                    HostModelProvider::new(descriptor, host).with_retry(self.retry.clone()),
                ),
            };
            registry.register(provider)?;
        }

        Ok(Assistant::new(
            registry,
            SessionCache::new(self.cache),
            self.limits,
            self.operation_timeout,
            self.retry,
            self.progress_buffer,
        ))
    }
}
