//! Caching subsystem.
//!
//! [`SessionCache`] holds live model sessions keyed on
//! `(provider, system_prompt)`. Each provider adapter owns one, tuned by its
//! descriptor hints; the assistant owns another for its own operations.
//! See [`session`] module docs for the lifecycle and guarantees.

pub mod session;

pub use session::{SessionCache, SessionCacheConfig, SessionKey};
