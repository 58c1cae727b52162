//! Orchestrator facade

mod assistant;
mod builder;
mod limits;

pub use assistant::{Assistant, ProgressEvent};
pub use builder::{DEFAULT_OPERATION_TIMEOUT, DEFAULT_PROGRESS_CHANNEL, Huginn, HuginnBuilder};
pub use limits::PromptLimits;
