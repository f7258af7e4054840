use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use taskq_domain::TaskRecord;

fn default_priority() -> String {
    "normal".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u32 {
    60
}

fn default_queue_name() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    pub task_name: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub args: Vec<Json>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, Json>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u32,
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub queue_name: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Wire form of a task record: priority rendered back to its label, never
/// the raw integer, matching the HTTP-boundary mapping in `Priority`.
#[derive(Debug, Serialize)]
pub struct TaskRecordDto {
    pub id: String,
    pub task_name: String,
    pub status: String,
    pub priority: String,
    pub args: Vec<Json>,
    pub kwargs: BTreeMap<String, Json>,
    pub result: Option<Json>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub retry_delay_seconds: u32,
    pub next_retry_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub worker_id: Option<String>,
    pub queue_name: String,
}

impl From<TaskRecord> for TaskRecordDto {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: record.id.to_string(),
            task_name: record.task_name,
            status: record.status.as_str().to_string(),
            priority: record.priority.label().to_string(),
            args: record.args,
            kwargs: record.kwargs,
            result: record.result,
            error_message: record.error_message,
            retry_count: record.retry_count,
            max_retries: record.max_retries,
            retry_delay_seconds: record.retry_delay_seconds,
            next_retry_at: record.next_retry_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            worker_id: record.worker_id,
            queue_name: record.queue_name,
        }
    }
}
