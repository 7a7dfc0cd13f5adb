//! The engine's error taxonomy.

/// A failure surfaced to the submitter of a command.
///
/// The writer never retries; every variant here is something the caller can
/// act on (fix the argument, back off and retry, or just stop waiting).
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// A null-equivalent or otherwise malformed argument (negative bound,
    /// empty queue list, `NaN` score, negative timeout, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A range or bound was rejected outright (as opposed to clamped).
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// `Heartbeat` was called for a server that was never announced or has
    /// since been removed.
    #[error("server not registered: {0}")]
    ServerGone(String),

    /// `AcquireDistributedLock` did not obtain the lock within its timeout.
    #[error("timed out waiting for lock on {resource:?} after {waited_ms}ms")]
    LockTimeout {
        /// The resource name the caller was waiting on.
        resource: String,
        /// How long the caller waited before giving up.
        waited_ms: u64,
    },

    /// A blocking operation observed a cancellation signal before its wake
    /// condition held.
    #[error("operation cancelled")]
    Cancelled,

    /// A command could not be delivered to (or collected from) the
    /// dispatcher because its timeout elapsed first.
    #[error("dispatch timed out")]
    DispatchTimeout,

    /// The writer detected a broken invariant. The engine remains
    /// consistent; this is a programming error in a caller or in the
    /// engine itself.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl EngineError {
    /// Shorthand for the common case of a single offending argument name.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Shorthand for a range/bound rejection.
    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRange(message.into())
    }
}
