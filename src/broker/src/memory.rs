use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskq_domain::{Envelope, QueueResult, TaskId};

use crate::{BrokerClient, BrokerStats, COMPLETED_LIST_CAP};

struct State {
    pending: HashMap<String, Vec<Envelope>>,
    processing: HashMap<String, HashMap<TaskId, Envelope>>,
    retry: Vec<(DateTime<Utc>, Envelope)>,
    completed: HashMap<String, Vec<TaskId>>,
    dead_letter: Vec<Envelope>,
}

/// In-process stand-in for [`RedisBroker`](crate::RedisBroker), used by
/// engine and worker tests so they don't need a live Redis. Mirrors the
/// same five-structure layout and the same atomicity guarantee on dequeue
/// (a single `Mutex` stands in for WATCH/MULTI/EXEC).
pub struct InMemoryBroker {
    state: Mutex<State>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: HashMap::new(),
                processing: HashMap::new(),
                retry: Vec::new(),
                completed: HashMap::new(),
                dead_letter: Vec::new(),
            }),
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn enqueue_pending(&self, envelope: &Envelope) -> QueueResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .pending
            .entry(envelope.queue_name.clone())
            .or_default()
            .push(envelope.clone());
        Ok(())
    }

    async fn dequeue_pending(
        &self,
        queue: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<Option<Envelope>> {
        let mut state = self.state.lock().unwrap();
        let Some(bucket) = state.pending.get_mut(queue) else {
            return Ok(None);
        };
        // Highest priority first, then earliest `created_at` within a tier.
        let winner = bucket
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.priority
                    .cmp(&b.priority)
                    .then(b.created_at.cmp(&a.created_at))
            })
            .map(|(idx, _)| idx);

        let Some(idx) = winner else {
            return Ok(None);
        };

        let envelope = bucket.remove(idx).assigned_to(worker_id, now);
        state
            .processing
            .entry(worker_id.to_string())
            .or_default()
            .insert(envelope.task_id, envelope.clone());
        Ok(Some(envelope))
    }

    async fn remove_processing(&self, worker_id: &str, task_id: TaskId) -> QueueResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .processing
            .get_mut(worker_id)
            .map(|map| map.remove(&task_id).is_some())
            .unwrap_or(false))
    }

    async fn push_completed(&self, queue: &str, task_id: TaskId) -> QueueResult<()> {
        let mut state = self.state.lock().unwrap();
        let list = state.completed.entry(queue.to_string()).or_default();
        list.insert(0, task_id);
        list.truncate(COMPLETED_LIST_CAP);
        Ok(())
    }

    async fn schedule_retry(&self, envelope: &Envelope, due: DateTime<Utc>) -> QueueResult<()> {
        let mut state = self.state.lock().unwrap();
        state.retry.push((due, envelope.clone()));
        Ok(())
    }

    async fn push_dead_letter(&self, envelope: &Envelope) -> QueueResult<()> {
        let mut state = self.state.lock().unwrap();
        state.dead_letter.push(envelope.clone());
        Ok(())
    }

    async fn due_retries(&self, now: DateTime<Utc>) -> QueueResult<Vec<Envelope>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .retry
            .iter()
            .filter(|(due, _)| *due <= now)
            .map(|(_, envelope)| envelope.clone())
            .collect())
    }

    async fn remove_retry(&self, envelope: &Envelope) -> QueueResult<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.retry.len();
        state.retry.retain(|(_, e)| e != envelope);
        Ok(state.retry.len() != before)
    }

    async fn stats(&self, queue: &str) -> QueueResult<BrokerStats> {
        let state = self.state.lock().unwrap();
        let pending = state.pending.get(queue).map(|v| v.len()).unwrap_or(0) as u64;
        let processing = state
            .processing
            .values()
            .map(|m| m.len() as u64)
            .sum::<u64>();
        let completed = state.completed.get(queue).map(|v| v.len()).unwrap_or(0) as u64;
        Ok(BrokerStats {
            pending,
            retry: state.retry.len() as u64,
            completed,
            dead_letter: state.dead_letter.len() as u64,
            processing,
        })
    }
}
