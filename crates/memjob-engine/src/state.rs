//! The writer-thread-exclusive data store.
//!
//! Every field here is mutated from exactly one place: `Dispatcher`'s writer
//! thread. No field is ever locked internally — the dispatcher thread is the
//! single mutator, so no locks on entries are needed.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use memjob_core::{EngineError, EngineKey, InvocationData, KeyComparer};

use crate::clock::MonotonicTime;
use crate::command::{CommandResult, JobData, JobRef, ReadCommand, Ttl, WriteCommand};
use crate::config::EngineConfig;
use crate::entry::{CounterEntry, HashEntry, JobEntry, ListEntry, LockEntry, QueueEntry, ServerEntry, SortedSetEntry};
use crate::ids::{ConnectionId, JobId};

/// Side effects of applying a batch of commands that something *outside*
/// `MemoryState` needs to act on: which queues got a new head (wake
/// fetchers) and which lock resources were released (wake lock waiters).
#[derive(Debug, Default)]
pub(crate) struct WriteEffects {
    pub(crate) woken_queues: Vec<String>,
    pub(crate) released_locks: Vec<String>,
}

pub(crate) struct MemoryState {
    config: EngineConfig,
    comparer: Arc<dyn KeyComparer>,

    jobs: HashMap<JobId, JobEntry>,
    hashes: HashMap<EngineKey, HashEntry>,
    lists: HashMap<EngineKey, ListEntry>,
    sets: HashMap<EngineKey, SortedSetEntry>,
    counters: HashMap<EngineKey, CounterEntry>,
    queues: HashMap<EngineKey, QueueEntry>,
    servers: HashMap<String, ServerEntry>,
    locks: HashMap<EngineKey, LockEntry>,
    locks_by_owner: HashMap<ConnectionId, HashSet<EngineKey>>,

    job_expirations: BinaryHeap<Reverse<(MonotonicTime, JobId)>>,
    hash_expirations: BinaryHeap<Reverse<(MonotonicTime, EngineKey)>>,
    list_expirations: BinaryHeap<Reverse<(MonotonicTime, EngineKey)>>,
    set_expirations: BinaryHeap<Reverse<(MonotonicTime, EngineKey)>>,
    counter_expirations: BinaryHeap<Reverse<(MonotonicTime, EngineKey)>>,

    /// Per-state job index for the monitoring read API. Exact-match on
    /// state name; insertion order preserved within a bucket.
    state_index: HashMap<String, IndexSet<JobId>>,
}

impl MemoryState {
    pub(crate) fn new(config: EngineConfig) -> Self {
        let comparer = config.key_comparer.clone();
        Self {
            config,
            comparer,
            jobs: HashMap::new(),
            hashes: HashMap::new(),
            lists: HashMap::new(),
            sets: HashMap::new(),
            counters: HashMap::new(),
            queues: HashMap::new(),
            servers: HashMap::new(),
            locks: HashMap::new(),
            locks_by_owner: HashMap::new(),
            job_expirations: BinaryHeap::new(),
            hash_expirations: BinaryHeap::new(),
            list_expirations: BinaryHeap::new(),
            set_expirations: BinaryHeap::new(),
            counter_expirations: BinaryHeap::new(),
            state_index: HashMap::new(),
        }
    }

    fn key(&self, raw: &str) -> EngineKey {
        EngineKey::new(raw, self.comparer.clone())
    }

    /// Apply the max-expiration clamp to expirations set *after* job
    /// creation. `CreateExpiredJob`'s initial `expireAt` never passes
    /// through this.
    fn clamp_expire_in(&self, expire_in: Duration) -> Duration {
        match self.config.max_expiration_time {
            Some(max) => expire_in.min(max),
            None => expire_in,
        }
    }

    fn ttl_of(&self, expire_at: Option<MonotonicTime>, now: MonotonicTime, exists: bool) -> Ttl {
        if !exists {
            return Ttl::None;
        }
        match expire_at {
            None => Ttl::None,
            Some(at) => Ttl::In(at.saturating_sub(now)),
        }
    }

    // ---- eviction -------------------------------------------------------

    /// Drop every entry whose `expireAt <= now` from each family and its
    /// expiration heap. O(k log N) in the number of expiring entries.
    pub(crate) fn evict_expired(&mut self, now: MonotonicTime) {
        while let Some(Reverse((at, job))) = self.job_expirations.peek().copied() {
            if at.has_elapsed(now) {
                self.job_expirations.pop();
                if self.jobs.get(&job).and_then(|j| j.expire_at) == Some(at) {
                    self.remove_job(job);
                }
            } else {
                break;
            }
        }
        Self::evict_family(&mut self.hash_expirations, &mut self.hashes, now, |e| e.expire_at);
        Self::evict_family(&mut self.list_expirations, &mut self.lists, now, |e| e.expire_at);
        Self::evict_family(&mut self.set_expirations, &mut self.sets, now, |e| e.expire_at);
        Self::evict_family(&mut self.counter_expirations, &mut self.counters, now, |e| e.expire_at);
    }

    fn evict_family<T>(
        heap: &mut BinaryHeap<Reverse<(MonotonicTime, EngineKey)>>,
        table: &mut HashMap<EngineKey, T>,
        now: MonotonicTime,
        expire_at_of: impl Fn(&T) -> Option<MonotonicTime>,
    ) {
        while let Some(Reverse((at, key))) = heap.peek().cloned() {
            if !at.has_elapsed(now) {
                break;
            }
            heap.pop();
            if table.get(&key).and_then(|e| expire_at_of(e)) == Some(at) {
                table.remove(&key);
            }
        }
    }

    fn remove_job(&mut self, job: JobId) {
        if let Some(entry) = self.jobs.remove(&job) {
            if let Some(name) = entry.state.as_ref().map(|s| s.name.clone()) {
                if let Some(bucket) = self.state_index.get_mut(&name) {
                    bucket.shift_remove(&job);
                }
            }
        }
    }

    pub(crate) fn remove_timed_out_servers(&mut self, now: MonotonicTime, timeout: Duration) -> usize {
        let dead: Vec<String> = self
            .servers
            .iter()
            .filter(|(_, s)| now.saturating_sub(s.heartbeat_at) >= timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dead {
            self.servers.remove(id);
        }
        dead.len()
    }

    // ---- reads ------------------------------------------------------------

    pub(crate) fn apply_read(
        &self,
        cmd: &ReadCommand,
        now: MonotonicTime,
        utc_now: chrono::DateTime<chrono::Utc>,
    ) -> Result<CommandResult, EngineError> {
        cmd.validate()?;
        Ok(match cmd {
            ReadCommand::GetJobData(job) => CommandResult::JobData(self.jobs.get(job).map(|j| JobData {
                invocation: j.invocation.clone(),
                state_name: j.state.as_ref().map(|s| s.name.clone()),
                created_at: j.created_at,
                parameters: j.parameters.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                load_exception: None,
            })),
            ReadCommand::GetStateData(job) => {
                CommandResult::StateData(self.jobs.get(job).and_then(|j| j.state.clone()))
            }
            ReadCommand::GetJobParameter(job, name) => CommandResult::StringOpt(
                self.jobs.get(job).and_then(|j| j.get_parameter(name)).map(str::to_string),
            ),
            ReadCommand::GetAllItemsFromList(key) => {
                CommandResult::Strings(self.lists.get(&self.key(key)).map(|l| l.items.iter().cloned().collect()).unwrap_or_default())
            }
            ReadCommand::GetRangeFromList(key, from, to) => CommandResult::Strings(
                self.lists.get(&self.key(key)).map(|l| l.range(*from, *to)).unwrap_or_default(),
            ),
            ReadCommand::GetListCount(key) => {
                CommandResult::Count(self.lists.get(&self.key(key)).map(|l| l.items.len()).unwrap_or(0))
            }
            ReadCommand::GetListTtl(key) => {
                let k = self.key(key);
                CommandResult::Ttl(self.ttl_of(self.lists.get(&k).and_then(|l| l.expire_at), now, self.lists.contains_key(&k)))
            }
            ReadCommand::GetAllEntriesFromHash(key) => CommandResult::Pairs(
                self.hashes
                    .get(&self.key(key))
                    .map(|h| h.fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default(),
            ),
            ReadCommand::GetHashCount(key) => {
                CommandResult::Count(self.hashes.get(&self.key(key)).map(|h| h.fields.len()).unwrap_or(0))
            }
            ReadCommand::GetValueFromHash(key, field) => CommandResult::StringOpt(
                self.hashes.get(&self.key(key)).and_then(|h| h.fields.get(field)).cloned().flatten(),
            ),
            ReadCommand::GetHashTtl(key) => {
                let k = self.key(key);
                CommandResult::Ttl(self.ttl_of(self.hashes.get(&k).and_then(|h| h.expire_at), now, self.hashes.contains_key(&k)))
            }
            ReadCommand::GetAllItemsFromSet(key) => CommandResult::Strings(
                self.sets.get(&self.key(key)).map(|s| s.iter().map(|(_, m)| m.to_string()).collect()).unwrap_or_default(),
            ),
            ReadCommand::GetRangeFromSet(key, from, to) => CommandResult::Strings(
                self.sets.get(&self.key(key)).map(|s| s.range(*from, *to)).unwrap_or_default(),
            ),
            ReadCommand::GetSetCount(key) => {
                CommandResult::Count(self.sets.get(&self.key(key)).map(|s| s.len()).unwrap_or(0))
            }
            ReadCommand::GetSetCountLimited(keys, limit) => {
                let sum: usize = keys.iter().map(|k| self.sets.get(&self.key(k)).map(|s| s.len()).unwrap_or(0)).sum();
                CommandResult::Count(sum.min((*limit) as usize))
            }
            ReadCommand::GetSetContains(key, member) => {
                CommandResult::Bool(self.sets.get(&self.key(key)).map(|s| s.contains(member)).unwrap_or(false))
            }
            ReadCommand::GetFirstByLowestScoreFromSet(key, from, to) => CommandResult::StringOpt(
                self.sets.get(&self.key(key)).and_then(|s| s.first_by_lowest_score(*from, *to)).map(str::to_string),
            ),
            ReadCommand::GetFirstByLowestScoreFromSetLimited(key, from, to, count) => {
                CommandResult::Strings(
                    self.sets
                        .get(&self.key(key))
                        .map(|s| s.take_by_lowest_score(*from, *to, *count as usize))
                        .unwrap_or_default(),
                )
            }
            ReadCommand::GetSetTtl(key) => {
                let k = self.key(key);
                CommandResult::Ttl(self.ttl_of(self.sets.get(&k).and_then(|s| s.expire_at), now, self.sets.contains_key(&k)))
            }
            ReadCommand::GetCounter(key) => {
                CommandResult::Counter(self.counters.get(&self.key(key)).map(|c| c.value).unwrap_or(0))
            }
            ReadCommand::GetJobTtl(job) => CommandResult::Ttl(match self.jobs.get(job) {
                None => Ttl::None,
                Some(j) => self.ttl_of(j.expire_at, now, true),
            }),
            ReadCommand::GetUtcDateTime => CommandResult::Utc(utc_now),
            ReadCommand::ListQueueNames => {
                let mut names: Vec<String> = self.queues.keys().map(|k| k.as_str().to_string()).collect();
                names.sort();
                CommandResult::Strings(names)
            }
            ReadCommand::PeekQueue(queue, count) => CommandResult::Strings(
                self.queues
                    .get(&self.key(queue))
                    .map(|q| q.items.iter().take(*count).cloned().collect())
                    .unwrap_or_default(),
            ),
            ReadCommand::GetQueueLength(queue) => {
                CommandResult::Count(self.queues.get(&self.key(queue)).map(|q| q.items.len()).unwrap_or(0))
            }
            ReadCommand::CountJobsByState(state) => {
                CommandResult::Count(self.state_index.get(state).map(|b| b.len()).unwrap_or(0))
            }
            ReadCommand::ListJobsByState(state, offset, count) => CommandResult::JobIds(
                self.state_index
                    .get(state)
                    .map(|b| b.iter().skip(*offset).take(*count).copied().collect())
                    .unwrap_or_default(),
            ),
        })
    }

    // ---- writes -------------------------------------------------------

    pub(crate) fn apply_write(
        &mut self,
        cmd: WriteCommand,
        now: MonotonicTime,
        effects: &mut WriteEffects,
    ) -> Result<CommandResult, EngineError> {
        cmd.validate()?;
        self.apply_write_unchecked(cmd, now, effects, &mut Vec::new())
    }

    /// Resolve a job reference against the ids created earlier in the same
    /// batch. Outside a batch `created` is always empty, so a
    /// `PendingInBatch` reference there is always a caller bug.
    fn resolve_job(created: &[JobId], job: JobRef) -> Result<JobId, EngineError> {
        match job {
            JobRef::Existing(id) => Ok(id),
            JobRef::PendingInBatch(index) => created.get(index).copied().ok_or_else(|| {
                EngineError::Internal(format!(
                    "transaction referenced job #{index} before it was created in this batch"
                ))
            }),
        }
    }

    fn apply_write_unchecked(
        &mut self,
        cmd: WriteCommand,
        now: MonotonicTime,
        effects: &mut WriteEffects,
        created: &mut Vec<JobId>,
    ) -> Result<CommandResult, EngineError> {
        match cmd {
            WriteCommand::CreateExpiredJob { invocation, parameters, expire_in } => {
                let id = self.create_expired_job(invocation, parameters, now, expire_in);
                created.push(id);
                Ok(CommandResult::JobCreated(id))
            }
            WriteCommand::SetJobParameter { job, name, value } => {
                let job = Self::resolve_job(created, job)?;
                if let Some(entry) = self.jobs.get_mut(&job) {
                    entry.set_parameter(&name, value);
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::SetJobState { job, state } => {
                let job = Self::resolve_job(created, job)?;
                if let Some(entry) = self.jobs.get_mut(&job) {
                    let previous_name = entry.state.as_ref().map(|s| s.name.clone());
                    entry.set_state(state.clone(), self.config.max_state_history_length);
                    if let Some(name) = previous_name {
                        if let Some(bucket) = self.state_index.get_mut(&name) {
                            bucket.shift_remove(&job);
                        }
                    }
                    self.state_index.entry(state.name.clone()).or_default().insert(job);
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::ExpireJob { job, expire_in } => {
                let job = Self::resolve_job(created, job)?;
                let expire_in = self.clamp_expire_in(expire_in);
                if let Some(entry) = self.jobs.get_mut(&job) {
                    let at = now.saturating_add(expire_in);
                    entry.expire_at = Some(at);
                    self.job_expirations.push(Reverse((at, job)));
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::PersistJob { job } => {
                let job = Self::resolve_job(created, job)?;
                if let Some(entry) = self.jobs.get_mut(&job) {
                    entry.expire_at = None;
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::AddToSet { key, member, score } => {
                let k = self.key(&key);
                self.sets.entry(k).or_default().add(&member, score);
                Ok(CommandResult::Unit)
            }
            WriteCommand::RemoveFromSet { key, member } => {
                let k = self.key(&key);
                if let Some(entry) = self.sets.get_mut(&k) {
                    entry.remove(&member);
                    if entry.is_empty() {
                        self.sets.remove(&k);
                    }
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::ExpireSet { key, expire_in } => {
                let expire_in = self.clamp_expire_in(expire_in);
                let k = self.key(&key);
                if let Some(entry) = self.sets.get_mut(&k) {
                    let at = now.saturating_add(expire_in);
                    entry.expire_at = Some(at);
                    self.set_expirations.push(Reverse((at, k)));
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::PersistSet { key } => {
                if let Some(entry) = self.sets.get_mut(&self.key(&key)) {
                    entry.expire_at = None;
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::InsertToList { key, value } => {
                let k = self.key(&key);
                self.lists.entry(k).or_default().insert(value);
                Ok(CommandResult::Unit)
            }
            WriteCommand::RemoveFromList { key, value } => {
                let k = self.key(&key);
                let mut removed = 0;
                if let Some(entry) = self.lists.get_mut(&k) {
                    removed = entry.remove(&value);
                    if entry.items.is_empty() {
                        self.lists.remove(&k);
                    }
                }
                Ok(CommandResult::Count(removed))
            }
            WriteCommand::ExpireList { key, expire_in } => {
                let expire_in = self.clamp_expire_in(expire_in);
                let k = self.key(&key);
                if let Some(entry) = self.lists.get_mut(&k) {
                    let at = now.saturating_add(expire_in);
                    entry.expire_at = Some(at);
                    self.list_expirations.push(Reverse((at, k)));
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::PersistList { key } => {
                if let Some(entry) = self.lists.get_mut(&self.key(&key)) {
                    entry.expire_at = None;
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::SetRangeInHash { key, values } => {
                if !values.is_empty() {
                    let k = self.key(&key);
                    self.hashes.entry(k).or_default().set_range(values);
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::RemoveHash { key } => {
                self.hashes.remove(&self.key(&key));
                Ok(CommandResult::Unit)
            }
            WriteCommand::ExpireHash { key, expire_in } => {
                let expire_in = self.clamp_expire_in(expire_in);
                let k = self.key(&key);
                if let Some(entry) = self.hashes.get_mut(&k) {
                    let at = now.saturating_add(expire_in);
                    entry.expire_at = Some(at);
                    self.hash_expirations.push(Reverse((at, k)));
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::PersistHash { key } => {
                if let Some(entry) = self.hashes.get_mut(&self.key(&key)) {
                    entry.expire_at = None;
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::IncrementCounter { key, by, expire_in } => {
                let clamped_expire_in = expire_in.map(|d| self.clamp_expire_in(d));
                let k = self.key(&key);
                let entry = self.counters.entry(k.clone()).or_insert(CounterEntry { value: 0, expire_at: None });
                entry.value += by;
                let value = entry.value;
                if let Some(expire_in) = clamped_expire_in {
                    let at = now.saturating_add(expire_in);
                    entry.expire_at = Some(at);
                    self.counter_expirations.push(Reverse((at, k)));
                }
                Ok(CommandResult::Counter(value))
            }
            WriteCommand::Enqueue { queue, job } => {
                let job = Self::resolve_job(created, job)?;
                let k = self.key(&queue);
                self.queues.entry(k).or_default().items.push_back(job.to_string());
                effects.woken_queues.push(queue);
                Ok(CommandResult::Unit)
            }
            WriteCommand::FetchFirstNonEmptyQueue { queues } => {
                for queue in &queues {
                    let k = self.key(queue);
                    let Some(entry) = self.queues.get_mut(&k) else { continue };
                    let Some(raw_id) = entry.items.pop_front() else { continue };
                    if entry.items.is_empty() {
                        self.queues.remove(&k);
                    }
                    let job_id: JobId = raw_id.parse().map_err(|_| {
                        EngineError::Internal(format!("queue {queue:?} held a malformed job id"))
                    })?;
                    return Ok(CommandResult::FetchedJob(Some((queue.clone(), job_id))));
                }
                Ok(CommandResult::FetchedJob(None))
            }
            WriteCommand::AnnounceServer { server_id, queues, worker_count } => {
                self.servers
                    .entry(server_id)
                    .and_modify(|s| {
                        s.queues = queues.clone();
                        s.worker_count = worker_count;
                        s.heartbeat_at = now;
                    })
                    .or_insert_with(|| ServerEntry { queues, worker_count, started_at: now, heartbeat_at: now });
                Ok(CommandResult::Unit)
            }
            WriteCommand::Heartbeat { server_id } => match self.servers.get_mut(&server_id) {
                Some(server) => {
                    server.heartbeat_at = now;
                    Ok(CommandResult::Unit)
                }
                None => Err(EngineError::ServerGone(server_id)),
            },
            WriteCommand::RemoveServer { server_id } => {
                self.servers.remove(&server_id);
                Ok(CommandResult::Unit)
            }
            WriteCommand::RemoveTimedOutServers { timeout } => {
                Ok(CommandResult::Count(self.remove_timed_out_servers(now, timeout)))
            }
            WriteCommand::TryAcquireLock { connection, resource } => {
                let k = self.key(&resource);
                match self.locks.get_mut(&k) {
                    Some(entry) if entry.owner == connection => {
                        entry.reentrancy_count += 1;
                        Ok(CommandResult::LockAttempt(true))
                    }
                    Some(_) => Ok(CommandResult::LockAttempt(false)),
                    None => {
                        self.locks.insert(k.clone(), LockEntry { owner: connection, reentrancy_count: 1 });
                        self.locks_by_owner.entry(connection).or_default().insert(k);
                        Ok(CommandResult::LockAttempt(true))
                    }
                }
            }
            WriteCommand::ReleaseLock { connection, resource } => {
                let k = self.key(&resource);
                match self.locks.get_mut(&k) {
                    Some(entry) if entry.owner == connection => {
                        entry.reentrancy_count -= 1;
                        if entry.reentrancy_count == 0 {
                            self.locks.remove(&k);
                            if let Some(owned) = self.locks_by_owner.get_mut(&connection) {
                                owned.remove(&k);
                            }
                            effects.released_locks.push(resource);
                        }
                        Ok(CommandResult::Unit)
                    }
                    _ => Err(EngineError::Internal(format!("release of unowned lock {resource:?}"))),
                }
            }
            WriteCommand::ReleaseAllLocks { connection } => {
                if let Some(owned) = self.locks_by_owner.remove(&connection) {
                    for k in owned {
                        self.locks.remove(&k);
                        effects.released_locks.push(k.as_str().to_string());
                    }
                }
                Ok(CommandResult::Unit)
            }
            WriteCommand::TransactionBatch(ops) => {
                let mut nested_created = Vec::new();
                let mut results = Vec::with_capacity(ops.len());
                for op in ops {
                    results.push(self.apply_write_unchecked(op, now, effects, &mut nested_created)?);
                }
                Ok(CommandResult::TransactionCommitted(results))
            }
        }
    }

    fn create_expired_job(
        &mut self,
        invocation: InvocationData,
        parameters: Vec<(String, Option<String>)>,
        now: MonotonicTime,
        expire_in: Duration,
    ) -> JobId {
        let id = JobId::next();
        if expire_in.is_zero() {
            // Born already evicted: the id is valid but no entry is created.
            return id;
        }
        let mut entry = JobEntry::new(invocation, now);
        for (name, value) in parameters {
            entry.set_parameter(&name, value);
        }
        let at = now.saturating_add(expire_in);
        entry.expire_at = Some(at);
        self.jobs.insert(id, entry);
        self.job_expirations.push(Reverse((at, id)));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memjob_core::InvocationData;

    fn invocation() -> InvocationData {
        InvocationData::new("Job", "Run", "[]", "[]")
    }

    #[test]
    fn job_with_zero_expire_in_is_born_evicted() {
        let mut state = MemoryState::new(EngineConfig::default());
        let mut effects = WriteEffects::default();
        let result = state
            .apply_write(
                WriteCommand::CreateExpiredJob { invocation: invocation(), parameters: vec![], expire_in: Duration::ZERO },
                MonotonicTime::ZERO,
                &mut effects,
            )
            .unwrap();
        let CommandResult::JobCreated(id) = result else { panic!("expected JobCreated") };
        let data = state.apply_read(&ReadCommand::GetJobData(id), MonotonicTime::ZERO, Utc::now()).unwrap();
        assert!(matches!(data, CommandResult::JobData(None)));
    }

    #[test]
    fn sorted_set_orders_by_score_then_member() {
        let mut state = MemoryState::new(EngineConfig::default());
        let mut effects = WriteEffects::default();
        for (member, score) in [("value2", 2.0), ("value1", 1.0), ("value3", 3.0)] {
            state
                .apply_write(
                    WriteCommand::AddToSet { key: "k".into(), member: member.into(), score },
                    MonotonicTime::ZERO,
                    &mut effects,
                )
                .unwrap();
        }
        let CommandResult::StringOpt(Some(lowest)) =
            state.apply_read(&ReadCommand::GetFirstByLowestScoreFromSet("k".into(), 0.0, 5.0), MonotonicTime::ZERO, Utc::now()).unwrap()
        else {
            panic!("expected a member")
        };
        assert_eq!(lowest, "value1");
    }

    #[test]
    fn remove_timed_out_servers_keeps_recent_heartbeats() {
        let mut state = MemoryState::new(EngineConfig::default());
        let mut effects = WriteEffects::default();
        let t0 = MonotonicTime::ZERO;
        for id in ["server-1", "server-2", "server-3"] {
            state
                .apply_write(
                    WriteCommand::AnnounceServer { server_id: id.into(), queues: vec![], worker_count: 1 },
                    t0,
                    &mut effects,
                )
                .unwrap();
        }
        let stale = t0.saturating_add(Duration::from_secs(40 * 60));
        state.servers.get_mut("server-2").unwrap().heartbeat_at = t0;
        let removed = state.remove_timed_out_servers(stale, Duration::from_secs(15 * 60));
        assert_eq!(removed, 1);
        assert!(state.servers.contains_key("server-1"));
        assert!(!state.servers.contains_key("server-2"));
    }
}
