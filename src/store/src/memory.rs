use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use taskq_domain::{QueueError, QueueResult, TaskId, TaskRecord, TaskStatus};

use crate::{TaskQuery, TaskRecordStore};

/// In-process stand-in for [`PostgresStore`](crate::PostgresStore), used in
/// engine/worker tests. Enforces the same transition preconditions so a test
/// exercising a double-complete or a stale retry sees the same
/// `PreconditionViolation` a real database would report.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<TaskId, TaskRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn transition(
        &self,
        id: TaskId,
        expected: &[TaskStatus],
        detail: &'static str,
        apply: impl FnOnce(&mut TaskRecord),
    ) -> QueueResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or(QueueError::NotFound(id))?;
        if !expected.contains(&record.status) {
            return Err(QueueError::PreconditionViolation {
                task_id: id,
                detail: detail.to_string(),
            });
        }
        apply(record);
        Ok(())
    }
}

#[async_trait]
impl TaskRecordStore for InMemoryStore {
    async fn insert(&self, record: &TaskRecord) -> QueueResult<()> {
        self.records.lock().unwrap().insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: TaskId) -> QueueResult<Option<TaskRecord>> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self, query: &TaskQuery) -> QueueResult<Vec<TaskRecord>> {
        let records = self.records.lock().unwrap();
        let mut matched: Vec<TaskRecord> = records
            .values()
            .filter(|r| query.status.map(|s| s == r.status).unwrap_or(true))
            .filter(|r| {
                query
                    .queue_name
                    .as_deref()
                    .map(|q| q == r.queue_name)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let limit = if query.limit > 0 { query.limit as usize } else { 100 };
        matched.truncate(limit);
        Ok(matched)
    }

    async fn mark_processing(
        &self,
        id: TaskId,
        worker_id: &str,
        started_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        self.transition(id, &[TaskStatus::Pending], "expected status=pending", |r| {
            r.status = TaskStatus::Processing;
            r.worker_id = Some(worker_id.to_string());
            r.started_at = Some(started_at);
            r.updated_at = started_at;
        })
    }

    async fn mark_completed(
        &self,
        id: TaskId,
        result: Json,
        completed_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        self.transition(
            id,
            &[TaskStatus::Processing],
            "expected status=processing",
            |r| {
                r.status = TaskStatus::Success;
                r.result = Some(result);
                r.error_message = None;
                r.completed_at = Some(completed_at);
                r.updated_at = completed_at;
            },
        )
    }

    async fn mark_failed(
        &self,
        id: TaskId,
        error_message: &str,
        completed_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        self.transition(
            id,
            &[TaskStatus::Processing, TaskStatus::Retry],
            "expected status in (processing, retry)",
            |r| {
                r.status = TaskStatus::Failed;
                r.error_message = Some(error_message.to_string());
                r.completed_at = Some(completed_at);
                r.updated_at = completed_at;
            },
        )
    }

    async fn mark_retry(
        &self,
        id: TaskId,
        error_message: &str,
        next_retry_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        self.transition(
            id,
            &[TaskStatus::Processing],
            "expected status=processing",
            |r| {
                r.status = TaskStatus::Retry;
                r.retry_count += 1;
                r.error_message = Some(error_message.to_string());
                r.next_retry_at = Some(next_retry_at);
                r.updated_at = updated_at;
            },
        )
    }

    async fn reset_to_pending(&self, id: TaskId, updated_at: DateTime<Utc>) -> QueueResult<()> {
        self.transition(id, &[TaskStatus::Retry], "expected status=retry", |r| {
            r.status = TaskStatus::Pending;
            r.updated_at = updated_at;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use taskq_domain::Priority;

    fn sample() -> TaskRecord {
        let now = Utc::now();
        TaskRecord {
            id: TaskId::new_v4(),
            task_name: "demo".into(),
            status: TaskStatus::Pending,
            priority: Priority::Normal,
            args: vec![],
            kwargs: BTreeMap::new(),
            result: None,
            error_message: None,
            retry_count: 0,
            max_retries: 2,
            retry_delay_seconds: 30,
            next_retry_at: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            worker_id: None,
            queue_name: "default".into(),
        }
    }

    #[tokio::test]
    async fn double_complete_is_a_precondition_violation() {
        let store = InMemoryStore::new();
        let record = sample();
        store.insert(&record).await.unwrap();
        store
            .mark_processing(record.id, "w1", Utc::now())
            .await
            .unwrap();
        store
            .mark_completed(record.id, Json::Null, Utc::now())
            .await
            .unwrap();

        let err = store
            .mark_completed(record.id, Json::Null, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::PreconditionViolation { .. }));
    }

    #[tokio::test]
    async fn retry_then_reset_round_trips_status() {
        let store = InMemoryStore::new();
        let record = sample();
        store.insert(&record).await.unwrap();
        store
            .mark_processing(record.id, "w1", Utc::now())
            .await
            .unwrap();
        store
            .mark_retry(record.id, "boom", Utc::now(), Utc::now())
            .await
            .unwrap();
        store.reset_to_pending(record.id, Utc::now()).await.unwrap();

        let fetched = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Pending);
        assert_eq!(fetched.retry_count, 1);
    }
}
