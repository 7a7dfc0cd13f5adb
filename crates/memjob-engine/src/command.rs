//! Tagged command variants, one per public operation.
//!
//! Each command owns its arguments and is matched against exactly one
//! [`CommandResult`] variant by the dispatcher; callers know which result
//! variant to expect and unwrap it (see `connection.rs`).

use std::time::Duration;

use memjob_core::{EngineError, InvocationData, StateData};

use crate::clock::MonotonicTime;
use crate::ids::{ConnectionId, JobId};

/// Time-to-live as reported by `Get*Ttl`: either no expiration (including
/// "the entity does not exist"), or a duration until `expireAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    None,
    In(Duration),
}

/// A reference to a job inside a [`WriteCommand::TransactionBatch`].
///
/// A transaction that creates a job and then sets its state or parameters in
/// the same atomic batch cannot know the new job's id until the batch
/// actually runs. `PendingInBatch(n)` names "whatever id the `n`th
/// `CreateExpiredJob` op in this same batch produces"; it is meaningless
/// outside a batch and resolves to an internal `Internal` error if used
/// there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRef {
    Existing(JobId),
    PendingInBatch(usize),
}

impl From<JobId> for JobRef {
    fn from(id: JobId) -> Self {
        JobRef::Existing(id)
    }
}

#[derive(Debug, Clone)]
pub struct JobData {
    pub invocation: InvocationData,
    pub state_name: Option<String>,
    pub created_at: MonotonicTime,
    pub parameters: Vec<(String, Option<String>)>,
    /// Always `None` in this engine: job-invocation deserialization is the
    /// host framework's job-activation layer, out of scope here. Kept on the
    /// type because `GetJobData`'s contract names it.
    pub load_exception: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) enum ReadCommand {
    GetJobData(JobId),
    GetStateData(JobId),
    GetJobParameter(JobId, String),
    GetAllItemsFromList(String),
    GetRangeFromList(String, usize, usize),
    GetListCount(String),
    GetListTtl(String),
    GetAllEntriesFromHash(String),
    GetHashCount(String),
    GetValueFromHash(String, String),
    GetHashTtl(String),
    GetAllItemsFromSet(String),
    GetRangeFromSet(String, usize, usize),
    GetSetCount(String),
    GetSetCountLimited(Vec<String>, i64),
    GetSetContains(String, String),
    GetFirstByLowestScoreFromSet(String, f64, f64),
    GetFirstByLowestScoreFromSetLimited(String, f64, f64, i64),
    GetSetTtl(String),
    GetCounter(String),
    GetJobTtl(JobId),
    GetUtcDateTime,
    ListQueueNames,
    PeekQueue(String, usize),
    GetQueueLength(String),
    CountJobsByState(String),
    ListJobsByState(String, usize, usize),
}

impl ReadCommand {
    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        match self {
            ReadCommand::GetRangeFromList(_, from, to) | ReadCommand::GetRangeFromSet(_, from, to) => {
                if to < from {
                    return Err(EngineError::invalid_range("endingAt must be >= startingFrom"));
                }
                Ok(())
            }
            ReadCommand::GetSetCountLimited(keys, limit) => {
                if keys.is_empty() {
                    return Err(EngineError::invalid_argument("keys must not be empty"));
                }
                if *limit < 0 {
                    return Err(EngineError::invalid_range("limit must not be negative"));
                }
                Ok(())
            }
            ReadCommand::GetFirstByLowestScoreFromSet(_, from, to) => {
                if to < from {
                    return Err(EngineError::invalid_range("toScore must be >= fromScore"));
                }
                if from.is_nan() || to.is_nan() {
                    return Err(EngineError::invalid_argument("score bounds must not be NaN"));
                }
                Ok(())
            }
            ReadCommand::GetFirstByLowestScoreFromSetLimited(_, from, to, count) => {
                if to < from {
                    return Err(EngineError::invalid_range("toScore must be >= fromScore"));
                }
                if from.is_nan() || to.is_nan() {
                    return Err(EngineError::invalid_argument("score bounds must not be NaN"));
                }
                if *count < 0 {
                    return Err(EngineError::invalid_range("count must not be negative"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum WriteCommand {
    CreateExpiredJob {
        invocation: InvocationData,
        parameters: Vec<(String, Option<String>)>,
        expire_in: Duration,
    },
    SetJobParameter {
        job: JobRef,
        name: String,
        value: Option<String>,
    },
    SetJobState {
        job: JobRef,
        state: StateData,
    },
    ExpireJob {
        job: JobRef,
        expire_in: Duration,
    },
    PersistJob {
        job: JobRef,
    },
    AddToSet {
        key: String,
        member: String,
        score: f64,
    },
    RemoveFromSet {
        key: String,
        member: String,
    },
    ExpireSet {
        key: String,
        expire_in: Duration,
    },
    PersistSet {
        key: String,
    },
    InsertToList {
        key: String,
        value: String,
    },
    RemoveFromList {
        key: String,
        value: String,
    },
    ExpireList {
        key: String,
        expire_in: Duration,
    },
    PersistList {
        key: String,
    },
    SetRangeInHash {
        key: String,
        values: Vec<(String, Option<String>)>,
    },
    RemoveHash {
        key: String,
    },
    ExpireHash {
        key: String,
        expire_in: Duration,
    },
    PersistHash {
        key: String,
    },
    IncrementCounter {
        key: String,
        by: i64,
        expire_in: Option<Duration>,
    },
    Enqueue {
        queue: String,
        job: JobRef,
    },
    /// Scan `queues` in order and pop the head of the first non-empty one.
    /// `queues` is already deduplicated by the caller.
    FetchFirstNonEmptyQueue {
        queues: Vec<String>,
    },
    AnnounceServer {
        server_id: String,
        queues: Vec<String>,
        worker_count: u32,
    },
    Heartbeat {
        server_id: String,
    },
    RemoveServer {
        server_id: String,
    },
    RemoveTimedOutServers {
        timeout: Duration,
    },
    /// Non-blocking acquisition attempt; the blocking/retry loop lives in
    /// `Connection::acquire_distributed_lock` — the dispatcher never blocks
    /// on its own queue.
    TryAcquireLock {
        connection: ConnectionId,
        resource: String,
    },
    ReleaseLock {
        connection: ConnectionId,
        resource: String,
    },
    /// All locks owned by a closing connection, released at once.
    ReleaseAllLocks {
        connection: ConnectionId,
    },
    /// An ordered batch of the write operations above, applied atomically.
    TransactionBatch(Vec<WriteCommand>),
}

#[derive(Debug, Clone)]
pub(crate) enum CommandResult {
    JobCreated(JobId),
    JobData(Option<JobData>),
    StateData(Option<StateData>),
    StringOpt(Option<String>),
    Strings(Vec<String>),
    Pairs(Vec<(String, Option<String>)>),
    Count(usize),
    Ttl(Ttl),
    Bool(bool),
    Counter(i64),
    Utc(chrono::DateTime<chrono::Utc>),
    /// Outcome of `TryAcquireLock`: granted, or must wait.
    LockAttempt(bool),
    JobIds(Vec<JobId>),
    /// Outcome of `FetchFirstNonEmptyQueue`: the queue it came from plus the
    /// job id, or `None` if every named queue was empty.
    FetchedJob(Option<(String, JobId)>),
    /// Per-op results of a `TransactionBatch`, in submission order.
    TransactionCommitted(Vec<CommandResult>),
    Unit,
}

impl WriteCommand {
    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        match self {
            WriteCommand::SetJobState { state, .. } if state.name.is_empty() => {
                Err(EngineError::invalid_argument("state name must not be empty"))
            }
            WriteCommand::AddToSet { score, .. } if score.is_nan() => {
                Err(EngineError::invalid_argument("score must not be NaN"))
            }
            WriteCommand::RemoveTimedOutServers { timeout } if timeout.is_zero() => Err(
                EngineError::invalid_argument("timeout must be greater than zero"),
            ),
            WriteCommand::FetchFirstNonEmptyQueue { queues } if queues.is_empty() => {
                Err(EngineError::invalid_argument("queues must not be empty"))
            }
            WriteCommand::TransactionBatch(ops) => ops.iter().try_for_each(Self::validate),
            _ => Ok(()),
        }
    }
}
