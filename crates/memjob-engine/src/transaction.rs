//! Atomic multi-op write transaction.
//!
//! A `Transaction` buffers an ordered list of elementary write operations
//! and submits them as a single `TransactionBatch` on [`Transaction::commit`]
//! — the batch applies on the writer thread as one contiguous unit, so
//! observers see all of its effects or none. Distributed-lock acquire/
//! release are the one exception: they execute immediately when called, not
//! deferred to `commit`, since a lock wait can block and the writer must
//! never be asked to block on its own queue.

use std::time::Duration;

use memjob_core::{EngineError, InvocationData, StateData};

use crate::cancel::CancellationToken;
use crate::command::{CommandResult, JobRef, WriteCommand};
use crate::connection::Connection;
use crate::ids::JobId;
use crate::lock::DistributedLockGuard;

/// The per-op results of a committed transaction, in submission order, plus
/// the ids of every job the transaction created (in the order the
/// corresponding `create_expired_job` calls were made) — the common case of
/// "create a job, then act on it later in the same call" doesn't need to
/// hunt through `results` for this.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub created_jobs: Vec<JobId>,
    pub results: Vec<CommandResult>,
}

/// A buffered, not-yet-submitted write batch.
pub struct Transaction<'conn> {
    connection: &'conn Connection,
    ops: Vec<WriteCommand>,
    pending_job_count: usize,
}

impl<'conn> Transaction<'conn> {
    pub(crate) fn new(connection: &'conn Connection) -> Self {
        Self { connection, ops: Vec::new(), pending_job_count: 0 }
    }

    fn push(&mut self, op: WriteCommand) -> &mut Self {
        self.ops.push(op);
        self
    }

    // ---- job lifecycle --------------------------------------------------

    /// Buffer a job creation. The returned [`JobRef`] can be passed to any
    /// later call on this same transaction (`set_job_state`, `enqueue`,
    /// ...) before the job actually exists anywhere.
    pub fn create_expired_job(
        &mut self,
        invocation: InvocationData,
        parameters: Vec<(String, Option<String>)>,
        expire_in: Duration,
    ) -> JobRef {
        self.push(WriteCommand::CreateExpiredJob { invocation, parameters, expire_in });
        let job_ref = JobRef::PendingInBatch(self.pending_job_count);
        self.pending_job_count += 1;
        job_ref
    }

    pub fn set_job_parameter(&mut self, job: impl Into<JobRef>, name: impl Into<String>, value: Option<String>) -> &mut Self {
        self.push(WriteCommand::SetJobParameter { job: job.into(), name: name.into(), value })
    }

    pub fn set_job_state(&mut self, job: impl Into<JobRef>, state: StateData) -> &mut Self {
        self.push(WriteCommand::SetJobState { job: job.into(), state })
    }

    pub fn expire_job(&mut self, job: impl Into<JobRef>, expire_in: Duration) -> &mut Self {
        self.push(WriteCommand::ExpireJob { job: job.into(), expire_in })
    }

    pub fn persist_job(&mut self, job: impl Into<JobRef>) -> &mut Self {
        self.push(WriteCommand::PersistJob { job: job.into() })
    }

    // ---- sets / lists / hashes / counters -------------------------------

    pub fn add_to_set(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> &mut Self {
        self.push(WriteCommand::AddToSet { key: key.into(), member: member.into(), score })
    }

    pub fn remove_from_set(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(WriteCommand::RemoveFromSet { key: key.into(), member: member.into() })
    }

    pub fn expire_set(&mut self, key: impl Into<String>, expire_in: Duration) -> &mut Self {
        self.push(WriteCommand::ExpireSet { key: key.into(), expire_in })
    }

    pub fn persist_set(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(WriteCommand::PersistSet { key: key.into() })
    }

    pub fn insert_to_list(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(WriteCommand::InsertToList { key: key.into(), value: value.into() })
    }

    pub fn remove_from_list(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(WriteCommand::RemoveFromList { key: key.into(), value: value.into() })
    }

    pub fn expire_list(&mut self, key: impl Into<String>, expire_in: Duration) -> &mut Self {
        self.push(WriteCommand::ExpireList { key: key.into(), expire_in })
    }

    pub fn persist_list(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(WriteCommand::PersistList { key: key.into() })
    }

    pub fn set_range_in_hash(&mut self, key: impl Into<String>, values: Vec<(String, Option<String>)>) -> &mut Self {
        self.push(WriteCommand::SetRangeInHash { key: key.into(), values })
    }

    pub fn remove_hash(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(WriteCommand::RemoveHash { key: key.into() })
    }

    pub fn expire_hash(&mut self, key: impl Into<String>, expire_in: Duration) -> &mut Self {
        self.push(WriteCommand::ExpireHash { key: key.into(), expire_in })
    }

    pub fn persist_hash(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(WriteCommand::PersistHash { key: key.into() })
    }

    pub fn increment_counter(&mut self, key: impl Into<String>, by: i64, expire_in: Option<Duration>) -> &mut Self {
        self.push(WriteCommand::IncrementCounter { key: key.into(), by, expire_in })
    }

    // ---- queues -----------------------------------------------------------

    pub fn enqueue(&mut self, queue: impl Into<String>, job: impl Into<JobRef>) -> &mut Self {
        self.push(WriteCommand::Enqueue { queue: queue.into(), job: job.into() })
    }

    // ---- servers --------------------------------------------------------

    pub fn announce_server(&mut self, server_id: impl Into<String>, queues: Vec<String>, worker_count: u32) -> &mut Self {
        self.push(WriteCommand::AnnounceServer { server_id: server_id.into(), queues, worker_count })
    }

    pub fn remove_server(&mut self, server_id: impl Into<String>) -> &mut Self {
        self.push(WriteCommand::RemoveServer { server_id: server_id.into() })
    }

    pub fn remove_timed_out_servers(&mut self, timeout: Duration) -> &mut Self {
        self.push(WriteCommand::RemoveTimedOutServers { timeout })
    }

    // ---- distributed locks (execute on submit, not deferred) ------------

    /// Acquire a distributed lock right now, outside this transaction's
    /// batch — not buffered into the eventual `commit`.
    pub fn acquire_lock(&self, resource: impl Into<String>, timeout: Duration) -> Result<DistributedLockGuard, EngineError> {
        self.connection.acquire_distributed_lock(resource, timeout)
    }

    pub fn acquire_lock_cancellable(
        &self,
        resource: impl Into<String>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DistributedLockGuard, EngineError> {
        self.connection.acquire_distributed_lock_cancellable(resource, timeout, cancel)
    }

    /// Release a lock right now. Equivalent to dropping `guard` directly;
    /// spelled out because "release distributed lock" is one of a
    /// transaction's supported elementary operations.
    pub fn release_lock(&self, guard: DistributedLockGuard) {
        drop(guard);
    }

    // ---- commit -----------------------------------------------------------

    /// Submit the buffered ops as one atomic `TransactionBatch`. An empty
    /// transaction is a no-op that still round-trips through the
    /// dispatcher, matching `SetRangeInHash({})`'s "no effect" idempotence
    /// at this coarser granularity.
    pub fn commit(self) -> Result<TransactionOutcome, EngineError> {
        let submitted = !self.ops.is_empty();
        let result = if submitted {
            self.connection.submit_write_command(WriteCommand::TransactionBatch(self.ops))?
        } else {
            CommandResult::TransactionCommitted(Vec::new())
        };
        let CommandResult::TransactionCommitted(results) = result else {
            unreachable!("TransactionBatch returned {result:?}")
        };
        let created_jobs = results
            .iter()
            .filter_map(|r| match r {
                CommandResult::JobCreated(id) => Some(*id),
                _ => None,
            })
            .collect();
        Ok(TransactionOutcome { created_jobs, results })
    }
}
