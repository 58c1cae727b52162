//! Public types for the Huginn API.

mod availability;
mod capabilities;
mod context;
mod message;
mod result;
mod status;

pub use availability::Availability;
pub use capabilities::Capability;
pub use context::{ClarifyingAnswer, FieldContext, PageContext};
pub use message::{Message, Role};
pub use result::{
    AnalysisResult, DEFAULT_VAGUENESS_SCORE, ERROR_PROVIDER, MAX_VAGUENESS_SCORE, Metadata,
    OptimizationResult, QuestionResult,
};
pub use status::{CacheStats, ProviderStatus, SessionStats, StatusSnapshot};
