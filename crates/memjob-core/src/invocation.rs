//! The opaque job-invocation blob.
//!
//! Method reflection and argument (de)serialization live entirely in the
//! host framework; the engine only stores and returns these four strings
//! (plus the originating queue name, if any) without ever introspecting
//! them.

use serde::{Deserialize, Serialize};

/// A snapshot of the host's job-invocation data, taken at `CreateExpiredJob`
/// time and handed back verbatim by `GetJobData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationData {
    /// Fully-qualified type name of the job method's declaring type.
    pub job_type: String,
    /// Method name to invoke.
    pub method: String,
    /// Serialized parameter-type descriptor, opaque to the engine.
    pub parameter_types: String,
    /// Serialized argument values, opaque to the engine.
    pub arguments: String,
    /// The queue the host intends to enqueue this job onto, if known at
    /// creation time.
    pub queue: Option<String>,
}

impl InvocationData {
    /// Build a new blob. All four core fields are required; `queue` is not.
    pub fn new(
        job_type: impl Into<String>,
        method: impl Into<String>,
        parameter_types: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            job_type: job_type.into(),
            method: method.into(),
            parameter_types: parameter_types.into(),
            arguments: arguments.into(),
            queue: None,
        }
    }

    /// Attach a target queue name.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let original = InvocationData::new("Jobs.Reports", "Generate", "[\"int\"]", "[42]").with_queue("reports");
        let json = serde_json::to_string(&original).expect("serialize");
        let restored: InvocationData = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, restored);
    }

    #[test]
    fn round_trips_without_a_queue() {
        let original = InvocationData::new("Jobs.Cleanup", "Run", "[]", "[]");
        let json = serde_json::to_string(&original).expect("serialize");
        let restored: InvocationData = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, restored);
        assert!(restored.queue.is_none());
    }
}
