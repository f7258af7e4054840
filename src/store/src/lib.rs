//! Durable, per-task state.
//!
//! The broker (`taskq-broker`) is the authoritative queue: what's pending,
//! what's in flight, what's due for retry. This crate is the side table a
//! producer or operator actually queries — one row per task, carrying the
//! full lifecycle history the broker doesn't keep once an envelope moves
//! past a structure.
//!
//! Preconditions on the `mark_*` transitions are best-effort: a lost race
//! (two workers completing the same task) surfaces as
//! [`QueueError::PreconditionViolation`] rather than corrupting the row, and
//! callers are expected to log and continue rather than fail the caller's
//! own operation.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use taskq_domain::{QueueResult, TaskId, TaskRecord};

/// A filter for listing task records, used by the HTTP listing endpoint and
/// the `list_tasks` CLI. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub status: Option<taskq_domain::TaskStatus>,
    pub queue_name: Option<String>,
    pub limit: i64,
}

#[async_trait]
pub trait TaskRecordStore: Send + Sync {
    /// Insert a freshly-submitted record with `status = pending`.
    async fn insert(&self, record: &TaskRecord) -> QueueResult<()>;

    async fn get(&self, id: TaskId) -> QueueResult<Option<TaskRecord>>;

    async fn list(&self, query: &TaskQuery) -> QueueResult<Vec<TaskRecord>>;

    /// `status = pending -> processing`; sets `worker_id`, `started_at`.
    async fn mark_processing(
        &self,
        id: TaskId,
        worker_id: &str,
        started_at: DateTime<Utc>,
    ) -> QueueResult<()>;

    /// `status = processing -> success`; sets `completed_at`, `result`.
    async fn mark_completed(
        &self,
        id: TaskId,
        result: Json,
        completed_at: DateTime<Utc>,
    ) -> QueueResult<()>;

    /// `status ∈ {processing, retry} -> failed`; sets `completed_at`,
    /// `error_message`. Terminal: used once retry budget is exhausted.
    async fn mark_failed(
        &self,
        id: TaskId,
        error_message: &str,
        completed_at: DateTime<Utc>,
    ) -> QueueResult<()>;

    /// `status = processing -> retry`; increments `retry_count`, sets
    /// `next_retry_at` and `error_message`.
    async fn mark_retry(
        &self,
        id: TaskId,
        error_message: &str,
        next_retry_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> QueueResult<()>;

    /// `status = retry -> pending`. The one backwards transition, taken by
    /// the retry promoter once a due retry is re-queued.
    async fn reset_to_pending(&self, id: TaskId, updated_at: DateTime<Utc>) -> QueueResult<()>;
}
