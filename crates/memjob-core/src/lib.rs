#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Shared types for the `memjob` in-process job storage engine.
//!
//! This crate has no threads and no mutable shared state — it only defines
//! the vocabulary the engine crate builds on: ordered-key comparers, the
//! opaque job invocation blob, the reduced job-state record, the public
//! error taxonomy, and the static feature-id predicate.

pub mod error;
pub mod feature;
pub mod invocation;
pub mod key;
pub mod state_data;

pub use error::EngineError;
pub use feature::FeatureId;
pub use invocation::InvocationData;
pub use key::{CaseInsensitiveKeyComparer, EngineKey, KeyComparer, OrdinalKeyComparer};
pub use state_data::StateData;
