//! Broker client over Redis.
//!
//! Five structures, all under the `task_queue:` prefix, exactly as laid out
//! in the interface contract: `pending:{queue}` (sorted set), `processing:{worker}`
//! (hash), `retry` (sorted set, shared across queues), `completed:{queue}`
//! (list), `dead_letter` (list). The only cross-structure move — popping the
//! highest-priority pending envelope into a worker's processing map — is done
//! under a WATCH/MULTI/EXEC optimistic transaction so a concurrent dequeue
//! never hands the same envelope to two workers.

mod keys;
mod memory;
mod redis_broker;
mod stats;

pub use memory::InMemoryBroker;
pub use redis_broker::RedisBroker;
pub use stats::BrokerStats;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskq_domain::{Envelope, QueueResult, TaskId};

/// Bound on `completed:{queue}`; oldest entries are trimmed past this length.
pub const COMPLETED_LIST_CAP: usize = 10_000;

/// Hash TTL applied to `processing:{worker}` on every write (§5: "the
/// `processing:{worker}` entry carries a 1-hour TTL... refreshed on each
/// assignment").
pub const PROCESSING_TTL_SECONDS: i64 = 3600;

/// Thin wrapper over broker primitives. No retry is performed at this layer;
/// transport errors surface as `QueueError::BrokerUnavailable` unchanged.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Insert an envelope into `pending:{queue}`, scored by priority (with an
    /// insertion-order tiebreak — the spec leaves the tiebreak unspecified).
    async fn enqueue_pending(&self, envelope: &Envelope) -> QueueResult<()>;

    /// Atomically pop the highest-priority envelope from `pending:{queue}`
    /// and move it into `processing:{worker_id}`. Returns `None` if the
    /// queue was empty. Never partially applies: either both the removal and
    /// the insertion happen, or neither does.
    async fn dequeue_pending(
        &self,
        queue: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<Option<Envelope>>;

    /// Remove a task-id from a worker's processing map. A no-op (returns
    /// `Ok(false)`) if it isn't present — callers must tolerate that for
    /// idempotent `complete`/`fail`.
    async fn remove_processing(&self, worker_id: &str, task_id: TaskId) -> QueueResult<bool>;

    /// Append a task-id to `completed:{queue}`, trimming the oldest entries
    /// past [`COMPLETED_LIST_CAP`].
    async fn push_completed(&self, queue: &str, task_id: TaskId) -> QueueResult<()>;

    /// Insert an envelope into the shared `retry` set, scored by its due
    /// timestamp (epoch seconds).
    async fn schedule_retry(&self, envelope: &Envelope, due: DateTime<Utc>) -> QueueResult<()>;

    /// Push a full envelope onto `dead_letter` (unlike `push_completed`,
    /// which stores only the id — see DESIGN.md for why this asymmetry is
    /// kept).
    async fn push_dead_letter(&self, envelope: &Envelope) -> QueueResult<()>;

    /// All envelopes in `retry` whose due time has passed.
    async fn due_retries(&self, now: DateTime<Utc>) -> QueueResult<Vec<Envelope>>;

    /// Remove a specific envelope from `retry`. Returns `Ok(false)` if it was
    /// already gone (another promoter pass, or a concurrent run).
    async fn remove_retry(&self, envelope: &Envelope) -> QueueResult<bool>;

    /// Aggregate counts across every structure for one queue, summing
    /// `processing:*` hash sizes over every worker partition.
    async fn stats(&self, queue: &str) -> QueueResult<BrokerStats>;
}
