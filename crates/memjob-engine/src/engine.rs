//! The top-level handle a host constructs once per process.
//!
//! `Engine` owns the single [`Dispatcher`] (and, through it, the one writer
//! thread and the one [`MemoryState`]) for the process's lifetime. Every
//! [`Connection`] it hands out shares that dispatcher; there is no
//! per-connection state beyond a [`crate::ids::ConnectionId`] and the locks
//! that id owns.

use std::sync::Arc;

use memjob_core::{EngineError, FeatureId};

use crate::clock::MonotonicClock;
use crate::config::EngineConfig;
use crate::connection::Connection;
use crate::dispatcher::Dispatcher;
use crate::state::MemoryState;

/// The in-process storage engine: the sole authority over its state.
pub struct Engine {
    dispatcher: Arc<Dispatcher>,
    config: EngineConfig,
}

impl Engine {
    /// Construct a fresh, empty engine with the given configuration. Spawns
    /// the writer thread immediately; it runs until the returned `Engine`
    /// (and every `Arc` clone of its dispatcher) is dropped.
    pub fn new(config: EngineConfig) -> Self {
        let clock = Arc::new(MonotonicClock::new());
        let state = MemoryState::new(config.clone());
        let dispatcher = Arc::new(Dispatcher::new(state, clock, config.inbox_capacity, config.command_timeout));
        tracing::info!(
            max_state_history_length = config.max_state_history_length,
            command_timeout_ms = config.command_timeout.as_millis() as u64,
            "memjob engine started"
        );
        Self { dispatcher, config }
    }

    /// Open a new connection. Closing it (dropping the returned value)
    /// releases every distributed lock it still holds.
    pub fn connect(&self) -> Connection {
        Connection::new(self.dispatcher.clone())
    }

    /// Whether the engine advertises `linearizableReads` — always `true`;
    /// this engine never takes a snapshot-read shortcut.
    pub fn linearizable_reads(&self) -> bool {
        true
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Static feature-id predicate. Does not require a live `Engine` — the
/// canonical id set is fixed at compile time.
pub fn has_feature(id: Option<&str>) -> Result<bool, EngineError> {
    memjob_core::feature::has_feature(id)
}

/// Every canonical feature id this engine always advertises `true` for.
pub const ADVERTISED_FEATURES: [FeatureId; 12] = [
    FeatureId::ExtendedApi,
    FeatureId::Queueing,
    FeatureId::BatchedLowestScoreFetch,
    FeatureId::UtcTimeAccessor,
    FeatureId::SetContains,
    FeatureId::LimitedSetCount,
    FeatureId::TransactionalLockAcquisition,
    FeatureId::InTransactionJobCreation,
    FeatureId::InTransactionJobParameterSet,
    FeatureId::TransactionalAcknowledgeOfFetchedJobs,
    FeatureId::DeletedStateGraphs,
    FeatureId::AwaitingStateListing,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_advertises_every_canonical_feature() {
        for feature in ADVERTISED_FEATURES {
            assert!(has_feature(Some(feature.as_str())).unwrap());
        }
    }

    #[test]
    fn default_engine_is_linearizable() {
        let engine = Engine::default();
        assert!(engine.linearizable_reads());
    }
}
