//! Provider contract, concrete adapter, registry and retry policy.

mod descriptor;
pub mod host_model;
pub mod registry;
pub mod retry;
pub mod traits;

pub use descriptor::{ProviderDescriptor, ProviderTuning};
pub use host_model::HostModelProvider;
pub use registry::ProviderRegistry;
pub use retry::RetryConfig;
pub use traits::{Provider, SessionRequest};
