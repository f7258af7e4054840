use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

use crate::priority::Priority;
use crate::TaskId;

/// Status of a task's lifecycle. See the module docs in `taskq-engine` for
/// the transition diagram; only `retry -> pending` goes backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Retry,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Retry => "retry",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "retry" => Some(Self::Retry),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Durable, per-task state. One row per task in the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_name: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub args: Vec<Json>,
    pub kwargs: BTreeMap<String, Json>,
    pub result: Option<Json>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub retry_delay_seconds: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub queue_name: String,
}

impl TaskRecord {
    /// Pure query: true if the record has retry budget left and, when a
    /// due time has been set, that time has passed.
    pub fn can_retry(&self, now: DateTime<Utc>) -> bool {
        if self.retry_count >= self.max_retries {
            return false;
        }
        match self.next_retry_at {
            Some(due) => due <= now,
            None => true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

/// Parameters supplied by a producer to create a new task record.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_name: String,
    pub args: Vec<Json>,
    pub kwargs: BTreeMap<String, Json>,
    pub priority: Priority,
    pub max_retries: u32,
    pub retry_delay_seconds: u32,
    pub queue_name: String,
}
