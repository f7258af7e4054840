use crate::TaskId;

/// Error taxonomy shared by every component. Maps 1:1 onto §7 of the task
/// queue specification: each variant is either surfaced to a producer (HTTP),
/// converted into a task failure, or swallowed by the worker loop after a
/// log line.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Producer input violated the submission schema.
    #[error("validation error: {0}")]
    Validation(String),

    /// A task named a function the registry doesn't know about. Converted
    /// into a task failure by the worker loop; does not crash the worker.
    #[error("task function not found: {0}")]
    TaskUnknown(String),

    /// The user task body returned or raised an error.
    #[error("task execution failed: {0}")]
    TaskExecution(String),

    /// The broker (Redis) was unreachable or returned a transport error.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(#[from] redis::RedisError),

    /// The durable record store (Postgres) was unreachable or errored.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// An expected state transition precondition didn't hold (e.g.
    /// completing a task that isn't processing). Logged, never propagated
    /// to a producer.
    #[error("precondition violated for task {task_id}: {detail}")]
    PreconditionViolation { task_id: TaskId, detail: String },

    /// A record the caller expected to exist was missing.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Envelope failed to (de)serialize — malformed JSON or an unknown
    /// field under the strict schema.
    #[error("envelope codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;
