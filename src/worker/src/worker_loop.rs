use std::time::Duration;

use taskq_engine::{DequeueOutcome, QueueEngine};
use taskq_registry::{Lookup, TaskRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::DEFAULT_POLL_INTERVAL;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub queue_name: String,
    pub poll_interval: Duration,
    pub max_tasks_per_run: Option<u64>,
}

impl WorkerConfig {
    pub fn new(worker_id: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue_name: queue_name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_tasks_per_run: None,
        }
    }
}

/// One worker's full lifetime: poll, execute, report, until `shutdown` is
/// cancelled or `max_tasks_per_run` is reached. Returns the number of tasks
/// it completed or failed (not counting `NoTask` polls).
pub async fn run_worker(
    engine: QueueEngine,
    registry: TaskRegistry,
    config: WorkerConfig,
    shutdown: CancellationToken,
) -> u64 {
    let mut tasks_processed: u64 = 0;
    info!(worker_id = %config.worker_id, queue = %config.queue_name, "worker starting");

    loop {
        if shutdown.is_cancelled() {
            break;
        }
        if let Some(max) = config.max_tasks_per_run {
            if tasks_processed >= max {
                info!(worker_id = %config.worker_id, tasks_processed, "reached max_tasks_per_run, stopping");
                break;
            }
        }

        let outcome = tokio::select! {
            outcome = engine.dequeue(&config.queue_name, &config.worker_id) => outcome,
            _ = shutdown.cancelled() => break,
        };

        match outcome {
            DequeueOutcome::NoTask => {
                tokio::select! {
                    _ = tokio::time::sleep(config.poll_interval) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
            DequeueOutcome::Infra(err) => {
                warn!(worker_id = %config.worker_id, %err, "dequeue infra error, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(config.poll_interval) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
            DequeueOutcome::Assigned(envelope) => {
                let worker_id = envelope.worker_id.clone().unwrap_or_else(|| config.worker_id.clone());
                match registry.lookup(&envelope.task_name) {
                    Lookup::Unknown(name) => {
                        engine
                            .fail(envelope.task_id, &worker_id, &format!("Task function not found: {name}"))
                            .await;
                    }
                    Lookup::Found(handler) => {
                        match handler.call(&envelope.args, &envelope.kwargs).await {
                            Ok(result) => {
                                engine.complete(envelope.task_id, &worker_id, result).await;
                            }
                            Err(err) => {
                                engine
                                    .fail(
                                        envelope.task_id,
                                        &worker_id,
                                        &format!("Task execution failed: {err}"),
                                    )
                                    .await;
                            }
                        }
                    }
                }
                tasks_processed += 1;
            }
        }
    }

    info!(worker_id = %config.worker_id, tasks_processed, "worker stopped");
    tasks_processed
}
