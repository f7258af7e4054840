//! Binds the broker and the record store into the five operations a
//! producer or worker actually calls: enqueue, dequeue, complete, fail, and
//! promote_retries. Nothing here talks to Redis or Postgres directly — that
//! lives in `taskq-broker`/`taskq-store` — this crate only sequences calls
//! to those two traits and decides what each outcome means.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as Json;
use taskq_broker::BrokerClient;
pub use taskq_broker::BrokerStats;
use taskq_domain::{Envelope, NewTask, QueueError, QueueResult, TaskId, TaskRecord, TaskStatus};
use taskq_store::{TaskRecordStore, TaskQuery};
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a single `dequeue` call, matched by the worker loop instead of
/// a `Result`'s `Err` arm — a broker transport error is routine backoff
/// input for a poller, not a reason to unwind.
pub enum DequeueOutcome {
    NoTask,
    Assigned(Envelope),
    Infra(QueueError),
}

/// Result of one `promote_retries` pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromotionReport {
    pub promoted: usize,
    pub errored: bool,
}

#[derive(Clone)]
pub struct QueueEngine {
    broker: Arc<dyn BrokerClient>,
    store: Arc<dyn TaskRecordStore>,
}

impl QueueEngine {
    pub fn new(broker: Arc<dyn BrokerClient>, store: Arc<dyn TaskRecordStore>) -> Self {
        Self { broker, store }
    }

    /// Creates the durable record before the broker entry, so a crash
    /// between the two leaves only an orphan pending record — invisible to
    /// workers, never a dangling envelope with no record behind it.
    pub async fn enqueue(&self, task: NewTask) -> QueueResult<TaskId> {
        let task_id = Uuid::new_v4();
        let now = Utc::now();

        let record = TaskRecord {
            id: task_id,
            task_name: task.task_name.clone(),
            status: TaskStatus::Pending,
            priority: task.priority,
            args: task.args.clone(),
            kwargs: task.kwargs.clone(),
            result: None,
            error_message: None,
            retry_count: 0,
            max_retries: task.max_retries,
            retry_delay_seconds: task.retry_delay_seconds,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            worker_id: None,
            queue_name: task.queue_name.clone(),
        };
        self.store.insert(&record).await?;

        let envelope = Envelope::new(task_id, &task, now);
        self.broker.enqueue_pending(&envelope).await?;

        Ok(task_id)
    }

    /// `worker_id` of `""` is assigned a fresh `worker_<8 hex>` identity.
    pub async fn dequeue(&self, queue: &str, worker_id: &str) -> DequeueOutcome {
        let worker_id = if worker_id.is_empty() {
            format!("worker_{:08x}", rand_suffix())
        } else {
            worker_id.to_string()
        };

        let envelope = match self.broker.dequeue_pending(queue, &worker_id, Utc::now()).await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return DequeueOutcome::NoTask,
            Err(err) => return DequeueOutcome::Infra(err),
        };

        if let Err(err) = self
            .store
            .mark_processing(envelope.task_id, &worker_id, Utc::now())
            .await
        {
            warn!(task_id = %envelope.task_id, %err, "mark_processing failed after dequeue; envelope stranded in processing");
            return DequeueOutcome::NoTask;
        }

        DequeueOutcome::Assigned(envelope)
    }

    /// Never raises: a lost race against another reporter shows up as a
    /// logged `PreconditionViolation`, and the overall call still reports
    /// success so the caller doesn't retry a task that already finished.
    pub async fn complete(&self, task_id: TaskId, worker_id: &str, result: Json) -> bool {
        let _ = self.broker.remove_processing(worker_id, task_id).await;

        let Some(record) = self.store.get(task_id).await.ok().flatten() else {
            warn!(%task_id, "complete called for unknown task record");
            return false;
        };

        match self.store.mark_completed(task_id, result, Utc::now()).await {
            Ok(()) => {}
            Err(QueueError::PreconditionViolation { detail, .. }) => {
                warn!(%task_id, detail, "complete: precondition violation, already resolved");
                return true;
            }
            Err(err) => {
                warn!(%task_id, %err, "mark_completed failed");
                return false;
            }
        }

        if let Err(err) = self.broker.push_completed(&record.queue_name, task_id).await {
            warn!(%task_id, %err, "push_completed failed after record was marked success");
        }
        true
    }

    /// Classifies the failure using the record store's view as
    /// authoritative: retry if budget remains, otherwise a terminal failure
    /// onto the dead-letter list. No broker-side retry counter exists.
    pub async fn fail(&self, task_id: TaskId, worker_id: &str, error: &str) -> bool {
        let _ = self.broker.remove_processing(worker_id, task_id).await;

        let Some(record) = self.store.get(task_id).await.ok().flatten() else {
            warn!(%task_id, "fail called for unknown task record");
            return false;
        };

        let now = Utc::now();
        if record.can_retry(now) {
            let due = now + chrono::Duration::seconds(record.retry_delay_seconds as i64);
            if let Err(err) = self.store.mark_retry(task_id, error, due, now).await {
                warn!(%task_id, %err, "mark_retry failed");
                return false;
            }
            let envelope = envelope_for_retry(&record, error, now);
            if let Err(err) = self.broker.schedule_retry(&envelope, due).await {
                warn!(%task_id, %err, "schedule_retry failed after record was marked retry");
            }
        } else {
            if let Err(err) = self.store.mark_failed(task_id, error, now).await {
                warn!(%task_id, %err, "mark_failed failed");
                return false;
            }
            let envelope = envelope_for_retry(&record, error, now);
            if let Err(err) = self.broker.push_dead_letter(&envelope).await {
                warn!(%task_id, %err, "push_dead_letter failed after record was marked failed");
            }
        }
        true
    }

    /// Moves every envelope whose due time has passed back onto its
    /// queue's pending set. Tolerates per-entry failure: the remaining
    /// entries are still observed on the next pass. `errored` drives the
    /// promoter's 30s/60s backoff cadence.
    pub async fn promote_retries(&self) -> PromotionReport {
        let now = Utc::now();
        let due = match self.broker.due_retries(now).await {
            Ok(due) => due,
            Err(err) => {
                warn!(%err, "due_retries failed, skipping this promotion pass");
                return PromotionReport { promoted: 0, errored: true };
            }
        };

        let mut promoted = 0;
        let mut errored = false;
        for envelope in due {
            if let Err(err) = self.broker.remove_retry(&envelope).await {
                warn!(task_id = %envelope.task_id, %err, "remove_retry failed, leaving entry for next pass");
                errored = true;
                continue;
            }
            if let Err(err) = self.broker.enqueue_pending(&envelope).await {
                warn!(task_id = %envelope.task_id, %err, "re-enqueue failed after removing from retry set");
                errored = true;
                continue;
            }
            if let Err(err) = self.store.reset_to_pending(envelope.task_id, now).await {
                warn!(task_id = %envelope.task_id, %err, "reset_to_pending failed");
                errored = true;
                continue;
            }
            promoted += 1;
        }
        if promoted > 0 {
            info!(promoted, "retry promotion pass complete");
        }
        PromotionReport { promoted, errored }
    }

    pub async fn stats(&self, queue: &str) -> QueueResult<BrokerStats> {
        self.broker.stats(queue).await
    }

    pub async fn get_record(&self, task_id: TaskId) -> QueueResult<Option<TaskRecord>> {
        self.store.get(task_id).await
    }

    pub async fn list_records(&self, query: &TaskQuery) -> QueueResult<Vec<TaskRecord>> {
        self.store.list(query).await
    }
}

fn envelope_for_retry(record: &TaskRecord, error: &str, now: chrono::DateTime<Utc>) -> Envelope {
    let task = NewTask {
        task_name: record.task_name.clone(),
        args: record.args.clone(),
        kwargs: record.kwargs.clone(),
        priority: record.priority,
        max_retries: record.max_retries,
        retry_delay_seconds: record.retry_delay_seconds,
        queue_name: record.queue_name.clone(),
    };
    let mut envelope = Envelope::new(record.id, &task, record.created_at);
    envelope.retry_count = record.retry_count + 1;
    envelope.error_message = Some(error.to_string());
    let _ = now;
    envelope
}

fn rand_suffix() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    nanos ^ (std::process::id())
}
