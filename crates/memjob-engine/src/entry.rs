//! Per-entity value types held inside the engine's state store.

use std::collections::VecDeque;

use indexmap::IndexMap;
use memjob_core::{InvocationData, StateData};

use crate::clock::MonotonicTime;
use crate::ids::ConnectionId;

/// A job: identity, invocation blob, parameters, state history and TTL.
#[derive(Debug, Clone)]
pub(crate) struct JobEntry {
    pub invocation: InvocationData,
    pub parameters: IndexMap<String, Option<String>>,
    /// Most-recent-first.
    pub history: Vec<StateData>,
    pub state: Option<StateData>,
    pub created_at: MonotonicTime,
    pub expire_at: Option<MonotonicTime>,
}

impl JobEntry {
    pub(crate) fn new(invocation: InvocationData, created_at: MonotonicTime) -> Self {
        Self {
            invocation,
            parameters: IndexMap::new(),
            history: Vec::new(),
            state: None,
            created_at,
            expire_at: None,
        }
    }

    /// Insertion-order preserving set; `IndexMap::insert` already overwrites
    /// the value in place without moving the key when it is already present.
    pub(crate) fn set_parameter(&mut self, name: &str, value: Option<String>) {
        match self.parameters.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.parameters.insert(name.to_string(), value);
            }
        }
    }

    pub(crate) fn get_parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(|v| v.as_deref())
    }

    /// Prepend the outgoing state to `history` and install `new_state`,
    /// then truncate `history` to `max_history` (0 = unbounded).
    pub(crate) fn set_state(&mut self, new_state: StateData, max_history: usize) {
        if let Some(previous) = self.state.replace(new_state) {
            self.history.insert(0, previous);
        }
        if max_history > 0 && self.history.len() > max_history {
            self.history.truncate(max_history);
        }
    }
}

/// Field-name → value map, insertion-order preserving, overwrite-in-place.
#[derive(Debug, Clone, Default)]
pub(crate) struct HashEntry {
    pub fields: IndexMap<String, Option<String>>,
    pub expire_at: Option<MonotonicTime>,
}

impl HashEntry {
    pub(crate) fn set_range(&mut self, values: impl IntoIterator<Item = (String, Option<String>)>) {
        for (name, value) in values {
            match self.fields.get_mut(&name) {
                Some(slot) => *slot = value,
                None => {
                    self.fields.insert(name, value);
                }
            }
        }
    }
}

/// Head-insertion ordered sequence (newest at index 0).
#[derive(Debug, Clone, Default)]
pub(crate) struct ListEntry {
    pub items: VecDeque<String>,
    pub expire_at: Option<MonotonicTime>,
}

impl ListEntry {
    pub(crate) fn insert(&mut self, value: String) {
        self.items.push_front(value);
    }

    /// Remove every occurrence of `value`; returns how many were removed.
    pub(crate) fn remove(&mut self, value: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item != value);
        before - self.items.len()
    }

    /// Items at `[starting_from, ending_at]` (inclusive, zero-based,
    /// clamped to the list's bounds), in head-to-tail order.
    pub(crate) fn range(&self, starting_from: usize, ending_at: usize) -> Vec<String> {
        if self.items.is_empty() || starting_from >= self.items.len() {
            return Vec::new();
        }
        let end = ending_at.min(self.items.len() - 1);
        self.items
            .iter()
            .skip(starting_from)
            .take(end - starting_from + 1)
            .cloned()
            .collect()
    }
}

/// `(score, member)` ordered, unique members. Backed by a sorted `Vec`
/// rather than a tree: sets in this workload stay small (schedule sets,
/// per-queue retry sets) and a sorted `Vec` gives the same asymptotics as a
/// B-tree for read-heavy range scans, with none of the pointer-chasing
/// overhead.
#[derive(Debug, Clone, Default)]
pub(crate) struct SortedSetEntry {
    /// Sorted by `(score, member)`; invariant maintained by every mutator.
    members: Vec<(f64, String)>,
    pub expire_at: Option<MonotonicTime>,
}

impl SortedSetEntry {
    fn position_of(&self, member: &str) -> Option<usize> {
        self.members.iter().position(|(_, m)| m == member)
    }

    fn insertion_point(&self, score: f64, member: &str) -> usize {
        self.members
            .partition_point(|(s, m)| (*s, m.as_str()) < (score, member))
    }

    /// Insert or move `member` to `score`. Returns `true` if this was a new
    /// member.
    pub(crate) fn add(&mut self, member: &str, score: f64) -> bool {
        let is_new = match self.position_of(member) {
            Some(idx) => {
                self.members.remove(idx);
                false
            }
            None => true,
        };
        let idx = self.insertion_point(score, member);
        self.members.insert(idx, (score, member.to_string()));
        is_new
    }

    pub(crate) fn remove(&mut self, member: &str) -> bool {
        match self.position_of(member) {
            Some(idx) => {
                self.members.remove(idx);
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, member: &str) -> bool {
        self.position_of(member).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (f64, &str)> {
        self.members.iter().map(|(s, m)| (*s, m.as_str()))
    }

    /// Members at `[starting_from, ending_at]` (inclusive, zero-based,
    /// clamped to the set's bounds).
    pub(crate) fn range(&self, starting_from: usize, ending_at: usize) -> Vec<String> {
        if self.members.is_empty() || starting_from >= self.members.len() {
            return Vec::new();
        }
        let end = ending_at.min(self.members.len() - 1);
        self.members[starting_from..=end]
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Lowest-scored member whose score lies in `[from_score, to_score]`.
    pub(crate) fn first_by_lowest_score(&self, from_score: f64, to_score: f64) -> Option<&str> {
        self.members
            .iter()
            .find(|(s, _)| *s >= from_score && *s <= to_score)
            .map(|(_, m)| m.as_str())
    }

    /// Up to `count` members in ascending `(score, member)` order whose
    /// score lies in `[from_score, to_score]`.
    pub(crate) fn take_by_lowest_score(&self, from_score: f64, to_score: f64, count: usize) -> Vec<String> {
        self.members
            .iter()
            .filter(|(s, _)| *s >= from_score && *s <= to_score)
            .take(count)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

/// Signed integer counter. Absent keys read as 0 (modeled by the entry
/// simply not existing in `MemoryState::counters`).
#[derive(Debug, Clone)]
pub(crate) struct CounterEntry {
    pub value: i64,
    pub expire_at: Option<MonotonicTime>,
}

/// FIFO of job ids; blocked fetchers wait on this queue's name in
/// [`crate::wait::FifoWaitRegistry`], not on anything stored here.
#[derive(Debug, Clone, Default)]
pub(crate) struct QueueEntry {
    pub items: VecDeque<String>,
}

/// A registered background-job server.
#[derive(Debug, Clone)]
pub(crate) struct ServerEntry {
    pub queues: Vec<String>,
    pub worker_count: u32,
    pub started_at: MonotonicTime,
    pub heartbeat_at: MonotonicTime,
}

/// A held distributed lock. Exists only while `reentrancy_count > 0`.
#[derive(Debug, Clone)]
pub(crate) struct LockEntry {
    pub owner: ConnectionId,
    pub reentrancy_count: u32,
}

#[cfg(test)]
mod sorted_set_property_tests {
    use super::SortedSetEntry;
    use proptest::prelude::*;

    fn is_sorted(entry: &SortedSetEntry) -> bool {
        entry.iter().zip(entry.iter().skip(1)).all(|(a, b)| a <= b)
    }

    proptest! {
        /// Whatever sequence of adds and removes a caller issues, the member
        /// list stays sorted by `(score, member)` and `len` tracks reality.
        #[test]
        fn stays_sorted_and_counted_through_random_ops(
            ops in prop::collection::vec((0u8..6, -100.0f64..100.0), 0..40)
        ) {
            let mut set = SortedSetEntry::default();
            let mut model: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
            for (slot, score) in ops {
                let member = format!("m{slot}");
                if score >= 0.0 {
                    set.add(&member, score);
                    model.insert(member, score);
                } else {
                    set.remove(&member);
                    model.remove(&member);
                }
                prop_assert!(is_sorted(&set));
                prop_assert_eq!(set.len(), model.len());
            }
        }

        /// Re-adding an existing member reports `is_new == false` and never
        /// duplicates it.
        #[test]
        fn readding_an_existing_member_is_not_new(first in -100.0f64..100.0, second in -100.0f64..100.0) {
            let mut set = SortedSetEntry::default();
            prop_assert!(set.add("only", first));
            prop_assert!(!set.add("only", second));
            prop_assert_eq!(set.len(), 1);
        }
    }
}
