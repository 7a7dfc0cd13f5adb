//! The reduced job-state record.
//!
//! The host framework's polymorphic `IState`-like objects are reduced to
//! this plain record at the engine boundary; the engine never introspects
//! further than `name`, except to match a handful of well-known names
//! case-insensitively for monitoring classification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A job's lifecycle phase at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateData {
    /// Non-empty state name (e.g. `"Enqueued"`, `"Processing"`, `"Failed"`).
    pub name: String,
    /// Human-readable reason for the transition, if the host supplied one.
    pub reason: Option<String>,
    /// Arbitrary state payload. Ordered so the defensive copy handed back
    /// by `GetStateData` is deterministic to compare in tests.
    pub data: BTreeMap<String, String>,
}

impl StateData {
    /// Build a state record. Panics only via the invariant checked by
    /// callers in the engine crate (`name` must be non-empty); this type
    /// itself does not validate, matching the host record it mirrors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: None,
            data: BTreeMap::new(),
        }
    }

    /// Attach a reason string.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach a data field.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive match used for monitoring classification
    /// (e.g. recognizing `"Enqueued"` / `"Scheduled"` regardless of the
    /// exact casing the host used).
    pub fn name_matches_ignore_case(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let original = StateData::new("Processing").with_reason("picked up by worker-3").with_data("attempt", "2");
        let json = serde_json::to_string(&original).expect("serialize");
        let restored: StateData = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, restored);
    }

    #[test]
    fn round_trips_with_no_reason_or_data() {
        let original = StateData::new("Enqueued");
        let json = serde_json::to_string(&original).expect("serialize");
        let restored: StateData = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, restored);
    }
}
