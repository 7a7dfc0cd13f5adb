//! Engine-construction options.

use std::sync::Arc;
use std::time::Duration;

use memjob_core::{KeyComparer, OrdinalKeyComparer};

/// Options recognized at [`crate::Engine`] construction.
#[derive(Clone)]
pub struct EngineConfig {
    /// Equality + ordering applied uniformly across every collection and
    /// index. Default: [`OrdinalKeyComparer`].
    pub key_comparer: Arc<dyn KeyComparer>,
    /// Upper clamp applied to expirations set *after* job creation; `None`
    /// means uncapped. Never applied at `CreateExpiredJob` time.
    pub max_expiration_time: Option<Duration>,
    /// Bound on `JobEntry::history`; oldest entries are dropped first.
    pub max_state_history_length: usize,
    /// Default deadline used by `submit` when a caller does not specify one.
    pub command_timeout: Duration,
    /// Bound on the dispatcher's inbox channel.
    pub inbox_capacity: usize,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_comparer(mut self, comparer: Arc<dyn KeyComparer>) -> Self {
        self.key_comparer = comparer;
        self
    }

    pub fn with_max_expiration_time(mut self, max: Duration) -> Self {
        self.max_expiration_time = Some(max);
        self
    }

    pub fn with_max_state_history_length(mut self, max: usize) -> Self {
        self.max_state_history_length = max;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_comparer: Arc::new(OrdinalKeyComparer),
            max_expiration_time: None,
            max_state_history_length: 10,
            command_timeout: Duration::from_secs(30),
            inbox_capacity: 4096,
        }
    }
}
