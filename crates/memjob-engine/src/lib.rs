#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! In-process, single-writer storage engine for background-job frameworks.
//!
//! An [`Engine`] owns one dispatcher (one writer thread, one owned state
//! store) for its whole lifetime; every [`Connection`] opened against it is
//! a thin handle that submits commands and blocks for their results.

mod cancel;
mod clock;
mod command;
mod config;
mod connection;
mod dispatcher;
mod engine;
mod entry;
mod ids;
mod lock;
mod state;
mod transaction;
mod wait;

pub use cancel::{CancellationToken, HookGuard};
pub use clock::{MonotonicClock, MonotonicTime};
pub use command::{JobData, JobRef, Ttl};
pub use config::EngineConfig;
pub use connection::{Connection, FetchedJob};
pub use engine::{has_feature, Engine, ADVERTISED_FEATURES};
pub use ids::JobId;
pub use lock::DistributedLockGuard;
pub use transaction::{Transaction, TransactionOutcome};

pub use memjob_core::{
    CaseInsensitiveKeyComparer, EngineError, EngineKey, FeatureId, InvocationData, KeyComparer,
    OrdinalKeyComparer, StateData,
};
