use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

use crate::priority::Priority;
use crate::record::NewTask;
use crate::{TaskId, ENVELOPE_SCHEMA_VERSION};

/// What actually lives in the broker: a JSON-encoded snapshot of a task
/// instance, independent of the durable record. `#[serde(deny_unknown_fields)]`
/// makes a malformed or future-versioned envelope a hard parse error instead
/// of a silently-dropped field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    pub schema_version: u8,
    pub task_id: TaskId,
    pub task_name: String,
    pub args: Vec<Json>,
    pub kwargs: BTreeMap<String, Json>,
    pub priority: Priority,
    pub queue_name: String,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub retry_delay_seconds: u32,
    pub error_message: Option<String>,
    /// Set only once the envelope has been handed to a worker; absent while
    /// pending or queued for retry.
    pub worker_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn new(task_id: TaskId, task: &NewTask, created_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: ENVELOPE_SCHEMA_VERSION,
            task_id,
            task_name: task.task_name.clone(),
            args: task.args.clone(),
            kwargs: task.kwargs.clone(),
            priority: task.priority,
            queue_name: task.queue_name.clone(),
            created_at,
            retry_count: 0,
            retry_delay_seconds: task.retry_delay_seconds,
            error_message: None,
            worker_id: None,
            started_at: None,
        }
    }

    pub fn assigned_to(mut self, worker_id: &str, started_at: DateTime<Utc>) -> Self {
        self.worker_id = Some(worker_id.to_string());
        self.started_at = Some(started_at);
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_fields() {
        let json = r#"{
            "schema_version": 1, "task_id": "00000000-0000-0000-0000-000000000000",
            "task_name": "x", "args": [], "kwargs": {}, "priority": "normal",
            "queue_name": "default", "created_at": "2026-01-01T00:00:00Z",
            "retry_count": 0, "retry_delay_seconds": 60, "error_message": null,
            "worker_id": null, "started_at": null, "bogus": 1
        }"#;
        assert!(Envelope::from_json(json).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let task = NewTask {
            task_name: "add".into(),
            args: vec![Json::from(1), Json::from(2)],
            kwargs: BTreeMap::new(),
            priority: Priority::High,
            max_retries: 3,
            retry_delay_seconds: 60,
            queue_name: "default".into(),
        };
        let env = Envelope::new(TaskId::new_v4(), &task, Utc::now());
        let encoded = env.to_json().unwrap();
        let decoded = Envelope::from_json(&encoded).unwrap();
        assert_eq!(env, decoded);
    }
}
