use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use taskq_domain::{Envelope, QueueError, QueueResult, TaskId};
use tracing::{debug, warn};

use crate::{keys, BrokerClient, BrokerStats, COMPLETED_LIST_CAP, PROCESSING_TTL_SECONDS};

/// `BrokerClient` backed by a real Redis server.
///
/// Holds a [`ConnectionManager`], which reconnects transparently on its own;
/// callers never see a dead connection, only the transport error for
/// whichever command hit it.
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(redis_url: &str) -> QueueResult<Self> {
        let client = Client::open(redis_url).map_err(QueueError::BrokerUnavailable)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        Ok(Self { conn })
    }

    /// Priority score for `pending:{queue}`: priority dominates, insertion
    /// order (millisecond timestamp, negated) breaks ties within a priority
    /// so FIFO holds for same-priority tasks. The spec leaves the tiebreak
    /// unspecified; this is the choice recorded in DESIGN.md.
    fn pending_score(envelope: &Envelope) -> f64 {
        envelope.priority.as_i16() as f64 * 1e15 - envelope.created_at.timestamp_millis() as f64
    }

    fn retry_score(due: DateTime<Utc>) -> f64 {
        due.timestamp() as f64
    }
}

#[async_trait]
impl BrokerClient for RedisBroker {
    async fn enqueue_pending(&self, envelope: &Envelope) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let member = envelope.to_json()?;
        let score = Self::pending_score(envelope);
        let _: () = conn
            .zadd(keys::pending(&envelope.queue_name), member, score)
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        Ok(())
    }

    async fn dequeue_pending(
        &self,
        queue: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<Option<Envelope>> {
        let pending_key = keys::pending(queue);
        let processing_key = keys::processing(worker_id);
        let mut conn = self.conn.clone();

        // WATCH/MULTI/EXEC: pop the highest-scored member from `pending` and
        // insert it into this worker's processing map in one atomic step.
        // `redis`'s sync `transaction()` helper has no async analogue, so the
        // optimistic-lock retry loop is written out by hand.
        loop {
            let _: () = redis::cmd("WATCH")
                .arg(&pending_key)
                .query_async(&mut conn)
                .await
                .map_err(QueueError::BrokerUnavailable)?;

            let top: Vec<String> = conn
                .zrevrange(&pending_key, 0, 0)
                .await
                .map_err(QueueError::BrokerUnavailable)?;

            let Some(member) = top.into_iter().next() else {
                let _: () = redis::cmd("UNWATCH")
                    .query_async(&mut conn)
                    .await
                    .map_err(QueueError::BrokerUnavailable)?;
                return Ok(None);
            };

            let envelope = Envelope::from_json(&member)?;

            let mut pipe = redis::pipe();
            pipe.atomic()
                .zrem(&pending_key, &member)
                .ignore()
                .hset(&processing_key, envelope.task_id.to_string(), &member)
                .ignore()
                .expire(&processing_key, PROCESSING_TTL_SECONDS)
                .ignore();

            let result: Option<()> = pipe
                .query_async(&mut conn)
                .await
                .map_err(QueueError::BrokerUnavailable)?;

            match result {
                Some(()) => {
                    let assigned = envelope.assigned_to(worker_id, now);
                    return Ok(Some(assigned));
                }
                None => {
                    // Another dequeuer won the race on `pending_key`; retry.
                    debug!(queue, worker_id, "dequeue transaction conflict, retrying");
                    continue;
                }
            }
        }
    }

    async fn remove_processing(&self, worker_id: &str, task_id: TaskId) -> QueueResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .hdel(keys::processing(worker_id), task_id.to_string())
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        Ok(removed > 0)
    }

    async fn push_completed(&self, queue: &str, task_id: TaskId) -> QueueResult<()> {
        let key = keys::completed(queue);
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .lpush(&key, task_id.to_string())
            .ignore()
            .ltrim(&key, 0, COMPLETED_LIST_CAP as isize - 1)
            .ignore();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        Ok(())
    }

    async fn schedule_retry(&self, envelope: &Envelope, due: DateTime<Utc>) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let member = envelope.to_json()?;
        let _: () = conn
            .zadd(keys::RETRY, member, Self::retry_score(due))
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        Ok(())
    }

    async fn push_dead_letter(&self, envelope: &Envelope) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let member = envelope.to_json()?;
        let _: () = conn
            .lpush(keys::DEAD_LETTER, member)
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        Ok(())
    }

    async fn due_retries(&self, now: DateTime<Utc>) -> QueueResult<Vec<Envelope>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrangebyscore(keys::RETRY, f64::NEG_INFINITY, now.timestamp() as f64)
            .await
            .map_err(QueueError::BrokerUnavailable)?;

        let mut envelopes = Vec::with_capacity(members.len());
        for member in members {
            match Envelope::from_json(&member) {
                Ok(envelope) => envelopes.push(envelope),
                Err(err) => warn!(%err, "dropping unparsable retry entry"),
            }
        }
        Ok(envelopes)
    }

    async fn remove_retry(&self, envelope: &Envelope) -> QueueResult<bool> {
        let member = envelope.to_json()?;
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .zrem(keys::RETRY, member)
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        Ok(removed > 0)
    }

    async fn stats(&self, queue: &str) -> QueueResult<BrokerStats> {
        let mut conn = self.conn.clone();

        let pending: u64 = conn
            .zcard(keys::pending(queue))
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        let retry: u64 = conn
            .zcard(keys::RETRY)
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        let completed: u64 = conn
            .llen(keys::completed(queue))
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        let dead_letter: u64 = conn
            .llen(keys::DEAD_LETTER)
            .await
            .map_err(QueueError::BrokerUnavailable)?;

        let worker_keys: Vec<String> = conn
            .keys(keys::processing_pattern())
            .await
            .map_err(QueueError::BrokerUnavailable)?;
        let mut processing = 0u64;
        for key in worker_keys {
            let len: u64 = conn.hlen(&key).await.map_err(QueueError::BrokerUnavailable)?;
            processing += len;
        }

        Ok(BrokerStats {
            pending,
            retry,
            completed,
            dead_letter,
            processing,
        })
    }
}
