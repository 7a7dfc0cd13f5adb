//! Per-caller façade over the dispatcher.
//!
//! Every public operation here validates its own arguments before ever
//! reaching the writer thread (non-null, non-negative range bounds), then
//! submits exactly one command and unwraps the one [`CommandResult`]
//! variant it expects. `fetch_next_job` and `acquire_distributed_lock` are
//! the two operations that can block the calling thread.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use memjob_core::{EngineError, InvocationData, StateData};

use crate::cancel::CancellationToken;
use crate::command::{CommandResult, JobData, JobRef, ReadCommand, Ttl, WriteCommand};
use crate::dispatcher::{Dispatcher, Inbound};
use crate::ids::{ConnectionId, JobId};
use crate::lock::DistributedLockGuard;
use crate::transaction::Transaction;

/// A job handed back by [`Connection::fetch_next_job`].
///
/// The engine never tracks this in-flight: there is no `RemoveFromQueue`/
/// `Dispose` to call. The host either calls [`Connection::requeue`] to put
/// it back at the tail of the same queue, or acknowledges it by deleting the
/// job inside a write transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedJob {
    pub queue_name: String,
    pub job_id: JobId,
}

fn non_negative(value: i64, what: &str) -> Result<usize, EngineError> {
    usize::try_from(value).map_err(|_| EngineError::invalid_range(format!("{what} must not be negative")))
}

/// A caller's handle onto the engine. Cheap to create; every operation is a
/// round trip through the single-writer [`Dispatcher`].
pub struct Connection {
    id: ConnectionId,
    dispatcher: Arc<Dispatcher>,
}

impl Connection {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { id: ConnectionId::next(), dispatcher }
    }

    fn submit_read(&self, cmd: ReadCommand) -> Result<CommandResult, EngineError> {
        self.dispatcher.submit(Inbound::Read(cmd))
    }

    fn submit_write(&self, cmd: WriteCommand) -> Result<CommandResult, EngineError> {
        self.dispatcher.submit(Inbound::Write(cmd))
    }

    // ---- job lifecycle --------------------------------------------------

    /// Create a new job. The engine always stamps `createdAt` from its own
    /// monotonic clock — wall-clock time is only ever derived from that
    /// reading via [`Connection::get_utc_date_time`].
    pub fn create_expired_job(
        &self,
        invocation: InvocationData,
        parameters: Vec<(String, Option<String>)>,
        expire_in: Duration,
    ) -> Result<JobId, EngineError> {
        match self.submit_write(WriteCommand::CreateExpiredJob { invocation, parameters, expire_in })? {
            CommandResult::JobCreated(id) => Ok(id),
            other => unreachable!("CreateExpiredJob returned {other:?}"),
        }
    }

    pub fn get_job_data(&self, job: JobId) -> Result<Option<JobData>, EngineError> {
        match self.submit_read(ReadCommand::GetJobData(job))? {
            CommandResult::JobData(data) => Ok(data),
            other => unreachable!("GetJobData returned {other:?}"),
        }
    }

    pub fn get_state_data(&self, job: JobId) -> Result<Option<StateData>, EngineError> {
        match self.submit_read(ReadCommand::GetStateData(job))? {
            CommandResult::StateData(state) => Ok(state),
            other => unreachable!("GetStateData returned {other:?}"),
        }
    }

    /// No-op when `job` is absent.
    pub fn set_job_parameter(&self, job: JobId, name: impl Into<String>, value: Option<String>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::SetJobParameter { job: JobRef::Existing(job), name: name.into(), value })?;
        Ok(())
    }

    pub fn get_job_parameter(&self, job: JobId, name: impl Into<String>) -> Result<Option<String>, EngineError> {
        match self.submit_read(ReadCommand::GetJobParameter(job, name.into()))? {
            CommandResult::StringOpt(value) => Ok(value),
            other => unreachable!("GetJobParameter returned {other:?}"),
        }
    }

    pub fn set_job_state(&self, job: JobId, state: StateData) -> Result<(), EngineError> {
        if state.name.is_empty() {
            return Err(EngineError::invalid_argument("state name must not be empty"));
        }
        self.submit_write(WriteCommand::SetJobState { job: JobRef::Existing(job), state })?;
        Ok(())
    }

    pub fn expire_job(&self, job: JobId, expire_in: Duration) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::ExpireJob { job: JobRef::Existing(job), expire_in })?;
        Ok(())
    }

    pub fn persist_job(&self, job: JobId) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::PersistJob { job: JobRef::Existing(job) })?;
        Ok(())
    }

    pub fn get_job_ttl(&self, job: JobId) -> Result<Ttl, EngineError> {
        match self.submit_read(ReadCommand::GetJobTtl(job))? {
            CommandResult::Ttl(ttl) => Ok(ttl),
            other => unreachable!("GetJobTtl returned {other:?}"),
        }
    }

    // ---- lists ------------------------------------------------------------

    pub fn insert_to_list(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::InsertToList { key: key.into(), value: value.into() })?;
        Ok(())
    }

    pub fn remove_from_list(&self, key: impl Into<String>, value: impl Into<String>) -> Result<usize, EngineError> {
        match self.submit_write(WriteCommand::RemoveFromList { key: key.into(), value: value.into() })? {
            CommandResult::Count(n) => Ok(n),
            other => unreachable!("RemoveFromList returned {other:?}"),
        }
    }

    pub fn expire_list(&self, key: impl Into<String>, expire_in: Duration) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::ExpireList { key: key.into(), expire_in })?;
        Ok(())
    }

    pub fn persist_list(&self, key: impl Into<String>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::PersistList { key: key.into() })?;
        Ok(())
    }

    pub fn get_all_items_from_list(&self, key: impl Into<String>) -> Result<Vec<String>, EngineError> {
        match self.submit_read(ReadCommand::GetAllItemsFromList(key.into()))? {
            CommandResult::Strings(items) => Ok(items),
            other => unreachable!("GetAllItemsFromList returned {other:?}"),
        }
    }

    pub fn get_range_from_list(&self, key: impl Into<String>, starting_from: i64, ending_at: i64) -> Result<Vec<String>, EngineError> {
        let from = non_negative(starting_from, "startingFrom")?;
        let to = non_negative(ending_at, "endingAt")?;
        match self.submit_read(ReadCommand::GetRangeFromList(key.into(), from, to))? {
            CommandResult::Strings(items) => Ok(items),
            other => unreachable!("GetRangeFromList returned {other:?}"),
        }
    }

    pub fn get_list_count(&self, key: impl Into<String>) -> Result<usize, EngineError> {
        match self.submit_read(ReadCommand::GetListCount(key.into()))? {
            CommandResult::Count(n) => Ok(n),
            other => unreachable!("GetListCount returned {other:?}"),
        }
    }

    pub fn get_list_ttl(&self, key: impl Into<String>) -> Result<Ttl, EngineError> {
        match self.submit_read(ReadCommand::GetListTtl(key.into()))? {
            CommandResult::Ttl(ttl) => Ok(ttl),
            other => unreachable!("GetListTtl returned {other:?}"),
        }
    }

    // ---- hashes -------------------------------------------------------

    pub fn set_range_in_hash(&self, key: impl Into<String>, values: Vec<(String, Option<String>)>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::SetRangeInHash { key: key.into(), values })?;
        Ok(())
    }

    pub fn remove_hash(&self, key: impl Into<String>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::RemoveHash { key: key.into() })?;
        Ok(())
    }

    pub fn expire_hash(&self, key: impl Into<String>, expire_in: Duration) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::ExpireHash { key: key.into(), expire_in })?;
        Ok(())
    }

    pub fn persist_hash(&self, key: impl Into<String>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::PersistHash { key: key.into() })?;
        Ok(())
    }

    pub fn get_all_entries_from_hash(&self, key: impl Into<String>) -> Result<Vec<(String, Option<String>)>, EngineError> {
        match self.submit_read(ReadCommand::GetAllEntriesFromHash(key.into()))? {
            CommandResult::Pairs(pairs) => Ok(pairs),
            other => unreachable!("GetAllEntriesFromHash returned {other:?}"),
        }
    }

    pub fn get_hash_count(&self, key: impl Into<String>) -> Result<usize, EngineError> {
        match self.submit_read(ReadCommand::GetHashCount(key.into()))? {
            CommandResult::Count(n) => Ok(n),
            other => unreachable!("GetHashCount returned {other:?}"),
        }
    }

    pub fn get_value_from_hash(&self, key: impl Into<String>, field: impl Into<String>) -> Result<Option<String>, EngineError> {
        match self.submit_read(ReadCommand::GetValueFromHash(key.into(), field.into()))? {
            CommandResult::StringOpt(value) => Ok(value),
            other => unreachable!("GetValueFromHash returned {other:?}"),
        }
    }

    pub fn get_hash_ttl(&self, key: impl Into<String>) -> Result<Ttl, EngineError> {
        match self.submit_read(ReadCommand::GetHashTtl(key.into()))? {
            CommandResult::Ttl(ttl) => Ok(ttl),
            other => unreachable!("GetHashTtl returned {other:?}"),
        }
    }

    // ---- sorted sets --------------------------------------------------

    pub fn add_to_set(&self, key: impl Into<String>, member: impl Into<String>, score: f64) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::AddToSet { key: key.into(), member: member.into(), score })?;
        Ok(())
    }

    pub fn remove_from_set(&self, key: impl Into<String>, member: impl Into<String>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::RemoveFromSet { key: key.into(), member: member.into() })?;
        Ok(())
    }

    pub fn expire_set(&self, key: impl Into<String>, expire_in: Duration) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::ExpireSet { key: key.into(), expire_in })?;
        Ok(())
    }

    pub fn persist_set(&self, key: impl Into<String>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::PersistSet { key: key.into() })?;
        Ok(())
    }

    pub fn get_all_items_from_set(&self, key: impl Into<String>) -> Result<Vec<String>, EngineError> {
        match self.submit_read(ReadCommand::GetAllItemsFromSet(key.into()))? {
            CommandResult::Strings(items) => Ok(items),
            other => unreachable!("GetAllItemsFromSet returned {other:?}"),
        }
    }

    pub fn get_range_from_set(&self, key: impl Into<String>, starting_from: i64, ending_at: i64) -> Result<Vec<String>, EngineError> {
        let from = non_negative(starting_from, "startingFrom")?;
        let to = non_negative(ending_at, "endingAt")?;
        match self.submit_read(ReadCommand::GetRangeFromSet(key.into(), from, to))? {
            CommandResult::Strings(items) => Ok(items),
            other => unreachable!("GetRangeFromSet returned {other:?}"),
        }
    }

    pub fn get_set_count(&self, key: impl Into<String>) -> Result<usize, EngineError> {
        match self.submit_read(ReadCommand::GetSetCount(key.into()))? {
            CommandResult::Count(n) => Ok(n),
            other => unreachable!("GetSetCount returned {other:?}"),
        }
    }

    pub fn get_set_count_limited(&self, keys: Vec<String>, limit: i64) -> Result<usize, EngineError> {
        match self.submit_read(ReadCommand::GetSetCountLimited(keys, limit))? {
            CommandResult::Count(n) => Ok(n),
            other => unreachable!("GetSetCountLimited returned {other:?}"),
        }
    }

    pub fn get_set_contains(&self, key: impl Into<String>, member: impl Into<String>) -> Result<bool, EngineError> {
        match self.submit_read(ReadCommand::GetSetContains(key.into(), member.into()))? {
            CommandResult::Bool(found) => Ok(found),
            other => unreachable!("GetSetContains returned {other:?}"),
        }
    }

    pub fn get_first_by_lowest_score_from_set(&self, key: impl Into<String>, from_score: f64, to_score: f64) -> Result<Option<String>, EngineError> {
        match self.submit_read(ReadCommand::GetFirstByLowestScoreFromSet(key.into(), from_score, to_score))? {
            CommandResult::StringOpt(member) => Ok(member),
            other => unreachable!("GetFirstByLowestScoreFromSet returned {other:?}"),
        }
    }

    pub fn get_first_by_lowest_score_from_set_limited(
        &self,
        key: impl Into<String>,
        from_score: f64,
        to_score: f64,
        count: i64,
    ) -> Result<Vec<String>, EngineError> {
        match self.submit_read(ReadCommand::GetFirstByLowestScoreFromSetLimited(key.into(), from_score, to_score, count))? {
            CommandResult::Strings(members) => Ok(members),
            other => unreachable!("GetFirstByLowestScoreFromSetLimited returned {other:?}"),
        }
    }

    pub fn get_set_ttl(&self, key: impl Into<String>) -> Result<Ttl, EngineError> {
        match self.submit_read(ReadCommand::GetSetTtl(key.into()))? {
            CommandResult::Ttl(ttl) => Ok(ttl),
            other => unreachable!("GetSetTtl returned {other:?}"),
        }
    }

    // ---- counters -------------------------------------------------------

    pub fn increment_counter(&self, key: impl Into<String>, by: i64, expire_in: Option<Duration>) -> Result<i64, EngineError> {
        match self.submit_write(WriteCommand::IncrementCounter { key: key.into(), by, expire_in })? {
            CommandResult::Counter(value) => Ok(value),
            other => unreachable!("IncrementCounter returned {other:?}"),
        }
    }

    pub fn get_counter(&self, key: impl Into<String>) -> Result<i64, EngineError> {
        match self.submit_read(ReadCommand::GetCounter(key.into()))? {
            CommandResult::Counter(value) => Ok(value),
            other => unreachable!("GetCounter returned {other:?}"),
        }
    }

    // ---- queues & fair fetch --------------------------------------------

    pub fn enqueue(&self, queue: impl Into<String>, job: JobId) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::Enqueue { queue: queue.into(), job: JobRef::Existing(job) })?;
        Ok(())
    }

    pub fn list_queue_names(&self) -> Result<Vec<String>, EngineError> {
        match self.submit_read(ReadCommand::ListQueueNames)? {
            CommandResult::Strings(names) => Ok(names),
            other => unreachable!("ListQueueNames returned {other:?}"),
        }
    }

    pub fn peek_queue(&self, queue: impl Into<String>, count: usize) -> Result<Vec<String>, EngineError> {
        match self.submit_read(ReadCommand::PeekQueue(queue.into(), count))? {
            CommandResult::Strings(ids) => Ok(ids),
            other => unreachable!("PeekQueue returned {other:?}"),
        }
    }

    pub fn get_queue_length(&self, queue: impl Into<String>) -> Result<usize, EngineError> {
        match self.submit_read(ReadCommand::GetQueueLength(queue.into()))? {
            CommandResult::Count(n) => Ok(n),
            other => unreachable!("GetQueueLength returned {other:?}"),
        }
    }

    /// Dedupe `queues` preserving first-occurrence order, then scan them in
    /// that order for the first non-empty FIFO. Blocks on the dispatcher's
    /// queue wait registry until a write to one of them wakes this caller,
    /// or `cancel` fires.
    pub fn fetch_next_job(&self, queues: &[String], cancel: &CancellationToken) -> Result<FetchedJob, EngineError> {
        if queues.is_empty() {
            return Err(EngineError::invalid_argument("queues must not be empty"));
        }
        let mut seen = HashSet::with_capacity(queues.len());
        let ordered: Vec<String> = queues.iter().filter(|q| seen.insert((*q).clone())).cloned().collect();

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            // Register before scanning, not after: a write that makes a
            // queue non-empty and fires `wake_one` between the scan and the
            // registration would otherwise wake a wait list that doesn't
            // contain this caller's token yet, and the wakeup is lost.
            let registration = self.dispatcher.queue_waiters.register_fan_out(&ordered);
            let hook_registration = registration.clone();
            let _hook = cancel.on_cancel(move || hook_registration.fire());

            match self.submit_write(WriteCommand::FetchFirstNonEmptyQueue { queues: ordered.clone() })? {
                CommandResult::FetchedJob(Some((queue_name, job_id))) => {
                    self.dispatcher.queue_waiters.cancel_fan_out(&registration);
                    return Ok(FetchedJob { queue_name, job_id });
                }
                CommandResult::FetchedJob(None) => {}
                other => unreachable!("FetchFirstNonEmptyQueue returned {other:?}"),
            }

            self.dispatcher.queue_waiters.wait_fan_out(&registration, None);
            // Either a queue write woke us, or `cancel` did; either way loop
            // back around, re-check cancellation and re-scan.
        }
    }

    /// Put a fetched job back at the tail of the queue it came from.
    pub fn requeue(&self, fetched: &FetchedJob) -> Result<(), EngineError> {
        self.enqueue(fetched.queue_name.clone(), fetched.job_id)
    }

    // ---- servers --------------------------------------------------------

    pub fn announce_server(&self, server_id: impl Into<String>, queues: Vec<String>, worker_count: u32) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::AnnounceServer { server_id: server_id.into(), queues, worker_count })?;
        Ok(())
    }

    pub fn heartbeat(&self, server_id: impl Into<String>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::Heartbeat { server_id: server_id.into() })?;
        Ok(())
    }

    pub fn remove_server(&self, server_id: impl Into<String>) -> Result<(), EngineError> {
        self.submit_write(WriteCommand::RemoveServer { server_id: server_id.into() })?;
        Ok(())
    }

    pub fn remove_timed_out_servers(&self, timeout: Duration) -> Result<usize, EngineError> {
        if timeout.is_zero() {
            return Err(EngineError::invalid_argument("timeout must be greater than zero"));
        }
        match self.submit_write(WriteCommand::RemoveTimedOutServers { timeout })? {
            CommandResult::Count(n) => Ok(n),
            other => unreachable!("RemoveTimedOutServers returned {other:?}"),
        }
    }

    // ---- monitoring read API ----------------------------------------------

    pub fn count_jobs_by_state(&self, state: impl Into<String>) -> Result<usize, EngineError> {
        match self.submit_read(ReadCommand::CountJobsByState(state.into()))? {
            CommandResult::Count(n) => Ok(n),
            other => unreachable!("CountJobsByState returned {other:?}"),
        }
    }

    pub fn list_jobs_by_state(&self, state: impl Into<String>, offset: usize, count: usize) -> Result<Vec<JobId>, EngineError> {
        match self.submit_read(ReadCommand::ListJobsByState(state.into(), offset, count))? {
            CommandResult::JobIds(ids) => Ok(ids),
            other => unreachable!("ListJobsByState returned {other:?}"),
        }
    }

    // ---- distributed locks ------------------------------------------------

    /// Acquire `resource`, blocking up to `timeout` (measured against
    /// `std::time::Instant`, itself already monotonic). `timeout =
    /// Duration::ZERO` is a single non-blocking attempt.
    pub fn acquire_distributed_lock(&self, resource: impl Into<String>, timeout: Duration) -> Result<DistributedLockGuard, EngineError> {
        self.acquire_distributed_lock_cancellable(resource, timeout, &CancellationToken::new())
    }

    pub fn acquire_distributed_lock_cancellable(
        &self,
        resource: impl Into<String>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DistributedLockGuard, EngineError> {
        let resource = resource.into();
        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            // Register before the acquire attempt: a release that grants
            // this resource and fires `wake_one` between the attempt and
            // the registration would otherwise wake a wait list that
            // doesn't contain this caller's token yet, and the wakeup is
            // lost until some unrelated later release happens to retry it.
            let registration = self.dispatcher.lock_waiters.register(&resource);
            let hook_registration = registration.clone();
            let _hook = cancel.on_cancel(move || hook_registration.fire());

            match self.submit_write(WriteCommand::TryAcquireLock { connection: self.id, resource: resource.clone() })? {
                CommandResult::LockAttempt(true) => {
                    self.dispatcher.lock_waiters.cancel(&registration);
                    return Ok(DistributedLockGuard::new(self.id, resource, self.dispatcher.clone()));
                }
                CommandResult::LockAttempt(false) => {}
                other => unreachable!("TryAcquireLock returned {other:?}"),
            }

            let now = Instant::now();
            if now >= deadline {
                self.dispatcher.lock_waiters.cancel(&registration);
                return Err(EngineError::LockTimeout { resource, waited_ms: timeout.as_millis() as u64 });
            }

            self.dispatcher.lock_waiters.wait_until(&registration, Some(deadline));
        }
    }

    // ---- misc -------------------------------------------------------------

    pub fn get_utc_date_time(&self) -> Result<DateTime<Utc>, EngineError> {
        match self.submit_read(ReadCommand::GetUtcDateTime)? {
            CommandResult::Utc(now) => Ok(now),
            other => unreachable!("GetUtcDateTime returned {other:?}"),
        }
    }

    /// Begin an atomic multi-op write transaction against this connection.
    /// Lock acquire/release issued through the returned transaction execute
    /// immediately, not deferred to `commit`.
    pub fn create_write_transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    pub(crate) fn submit_write_command(&self, cmd: WriteCommand) -> Result<CommandResult, EngineError> {
        self.submit_write(cmd)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.dispatcher.submit(Inbound::Write(WriteCommand::ReleaseAllLocks { connection: self.id }));
    }
}
