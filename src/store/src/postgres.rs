use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde_json::Value as Json;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use taskq_domain::{Priority, QueueError, QueueResult, TaskId, TaskRecord, TaskStatus};

use crate::{TaskQuery, TaskRecordStore};

/// `TaskRecordStore` backed by Postgres via `sqlx`.
///
/// Uses runtime-checked `query`/`query_as` rather than the `query!` macros:
/// those need a live database (or a cached `.sqlx` directory) to validate
/// against at compile time, which this workspace has no way to provide.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> QueueResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(QueueError::StoreUnavailable)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> QueueResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| QueueError::StoreUnavailable(sqlx::Error::from(err)))
    }

    fn row_to_record(row: PgRow) -> QueueResult<TaskRecord> {
        let status_raw: String = row.try_get("status").map_err(QueueError::StoreUnavailable)?;
        let status = TaskStatus::from_str(&status_raw).ok_or_else(|| {
            QueueError::Codec(serde_json::Error::custom(format!(
                "unrecognized stored status: {status_raw}"
            )))
        })?;

        let priority_raw: i16 = row.try_get("priority").map_err(QueueError::StoreUnavailable)?;
        let priority = Priority::from_i16(priority_raw).ok_or_else(|| {
            QueueError::Codec(serde_json::Error::custom(format!(
                "unrecognized stored priority: {priority_raw}"
            )))
        })?;

        let args: Json = row.try_get("args").map_err(QueueError::StoreUnavailable)?;
        let kwargs: Json = row.try_get("kwargs").map_err(QueueError::StoreUnavailable)?;

        Ok(TaskRecord {
            id: row.try_get("id").map_err(QueueError::StoreUnavailable)?,
            task_name: row.try_get("task_name").map_err(QueueError::StoreUnavailable)?,
            status,
            priority,
            args: args.as_array().cloned().unwrap_or_default(),
            kwargs: serde_json::from_value(kwargs).unwrap_or_default(),
            result: row.try_get("result").map_err(QueueError::StoreUnavailable)?,
            error_message: row.try_get("error_message").map_err(QueueError::StoreUnavailable)?,
            retry_count: row.try_get::<i32, _>("retry_count").map_err(QueueError::StoreUnavailable)? as u32,
            max_retries: row.try_get::<i32, _>("max_retries").map_err(QueueError::StoreUnavailable)? as u32,
            retry_delay_seconds: row
                .try_get::<i32, _>("retry_delay_seconds")
                .map_err(QueueError::StoreUnavailable)? as u32,
            next_retry_at: row.try_get("next_retry_at").map_err(QueueError::StoreUnavailable)?,
            created_at: row.try_get("created_at").map_err(QueueError::StoreUnavailable)?,
            updated_at: row.try_get("updated_at").map_err(QueueError::StoreUnavailable)?,
            started_at: row.try_get("started_at").map_err(QueueError::StoreUnavailable)?,
            completed_at: row.try_get("completed_at").map_err(QueueError::StoreUnavailable)?,
            worker_id: row.try_get("worker_id").map_err(QueueError::StoreUnavailable)?,
            queue_name: row.try_get("queue_name").map_err(QueueError::StoreUnavailable)?,
        })
    }
}

#[async_trait]
impl TaskRecordStore for PostgresStore {
    async fn insert(&self, record: &TaskRecord) -> QueueResult<()> {
        sqlx::query(
            r#"
            INSERT INTO task_records (
                id, task_name, status, priority, args, kwargs, result, error_message,
                retry_count, max_retries, retry_delay_seconds, next_retry_at,
                created_at, updated_at, started_at, completed_at, worker_id, queue_name
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(record.id)
        .bind(&record.task_name)
        .bind(record.status.as_str())
        .bind(record.priority.as_i16())
        .bind(Json::from(record.args.clone()))
        .bind(serde_json::to_value(&record.kwargs).unwrap_or(Json::Null))
        .bind(&record.result)
        .bind(&record.error_message)
        .bind(record.retry_count as i32)
        .bind(record.max_retries as i32)
        .bind(record.retry_delay_seconds as i32)
        .bind(record.next_retry_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(&record.worker_id)
        .bind(&record.queue_name)
        .execute(&self.pool)
        .await
        .map_err(QueueError::StoreUnavailable)?;
        Ok(())
    }

    async fn get(&self, id: TaskId) -> QueueResult<Option<TaskRecord>> {
        let row = sqlx::query("SELECT * FROM task_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueueError::StoreUnavailable)?;
        row.map(Self::row_to_record).transpose()
    }

    async fn list(&self, query: &TaskQuery) -> QueueResult<Vec<TaskRecord>> {
        let limit = if query.limit > 0 { query.limit } else { 100 };
        let rows = sqlx::query(
            r#"
            SELECT * FROM task_records
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR queue_name = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(query.status.map(|s| s.as_str().to_string()))
        .bind(query.queue_name.clone())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(QueueError::StoreUnavailable)?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn mark_processing(
        &self,
        id: TaskId,
        worker_id: &str,
        started_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE task_records
            SET status = 'processing', worker_id = $2, started_at = $3, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(started_at)
        .execute(&self.pool)
        .await
        .map_err(QueueError::StoreUnavailable)?;

        precondition(result.rows_affected(), id, "expected status=pending")
    }

    async fn mark_completed(
        &self,
        id: TaskId,
        result: Json,
        completed_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        let outcome = sqlx::query(
            r#"
            UPDATE task_records
            SET status = 'success', result = $2, error_message = NULL, completed_at = $3, updated_at = $3
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(result)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(QueueError::StoreUnavailable)?;

        precondition(outcome.rows_affected(), id, "expected status=processing")
    }

    async fn mark_failed(
        &self,
        id: TaskId,
        error_message: &str,
        completed_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        let outcome = sqlx::query(
            r#"
            UPDATE task_records
            SET status = 'failed', error_message = $2, completed_at = $3, updated_at = $3
            WHERE id = $1 AND status IN ('processing', 'retry')
            "#,
        )
        .bind(id)
        .bind(error_message)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(QueueError::StoreUnavailable)?;

        precondition(outcome.rows_affected(), id, "expected status in (processing, retry)")
    }

    async fn mark_retry(
        &self,
        id: TaskId,
        error_message: &str,
        next_retry_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        let outcome = sqlx::query(
            r#"
            UPDATE task_records
            SET status = 'retry', retry_count = retry_count + 1,
                error_message = $2, next_retry_at = $3, updated_at = $4
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(error_message)
        .bind(next_retry_at)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(QueueError::StoreUnavailable)?;

        precondition(outcome.rows_affected(), id, "expected status=processing")
    }

    async fn reset_to_pending(&self, id: TaskId, updated_at: DateTime<Utc>) -> QueueResult<()> {
        let outcome = sqlx::query(
            r#"
            UPDATE task_records
            SET status = 'pending', updated_at = $2
            WHERE id = $1 AND status = 'retry'
            "#,
        )
        .bind(id)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(QueueError::StoreUnavailable)?;

        precondition(outcome.rows_affected(), id, "expected status=retry")
    }
}

/// Turns a zero-row `UPDATE` into a `PreconditionViolation` instead of
/// silently succeeding; callers log and continue per store-level contract.
fn precondition(rows_affected: u64, id: TaskId, detail: &str) -> QueueResult<()> {
    if rows_affected == 0 {
        return Err(QueueError::PreconditionViolation {
            task_id: id,
            detail: detail.to_string(),
        });
    }
    Ok(())
}
