use std::time::Duration;

use anyhow::Result;
use taskq_engine::QueueEngine;
use taskq_registry::TaskRegistry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{spawn_retry_promoter, run_worker, WorkerConfig};

/// Spawns `N` workers plus the one shared retry promoter under a single
/// `CancellationToken`, and joins all of them on shutdown. Mirrors the
/// construction-root pattern used for the process's other long-running
/// services: a flat list of named handles, joined in a fixed order.
pub struct WorkerPool {
    cancel_token: CancellationToken,
    workers: Vec<(String, JoinHandle<u64>)>,
    promoter: JoinHandle<()>,
}

impl WorkerPool {
    /// `worker_id` per task is deterministic: `worker_<queue>_<1..N>`.
    pub fn spawn(
        engine: QueueEngine,
        registry: TaskRegistry,
        queue_name: &str,
        worker_count: usize,
        poll_interval: Duration,
        max_tasks_per_run: Option<u64>,
        cancel_token: CancellationToken,
    ) -> Self {
        let promoter = spawn_retry_promoter(engine.clone(), cancel_token.child_token());

        let workers = (1..=worker_count)
            .map(|n| {
                let worker_id = format!("worker_{queue_name}_{n}");
                let config = WorkerConfig {
                    worker_id: worker_id.clone(),
                    queue_name: queue_name.to_string(),
                    poll_interval,
                    max_tasks_per_run,
                };
                let handle = tokio::spawn(run_worker(
                    engine.clone(),
                    registry.clone(),
                    config,
                    cancel_token.child_token(),
                ));
                (worker_id, handle)
            })
            .collect();

        info!(queue = queue_name, worker_count, "worker pool spawned");

        Self {
            cancel_token,
            workers,
            promoter,
        }
    }

    /// Spawns a single deterministically-named worker; used when the caller
    /// supplied an explicit `--worker-id` (only valid for `workers=1`).
    pub fn spawn_single(
        engine: QueueEngine,
        registry: TaskRegistry,
        config: WorkerConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        let promoter = spawn_retry_promoter(engine.clone(), cancel_token.child_token());
        let worker_id = config.worker_id.clone();
        let handle = tokio::spawn(run_worker(engine, registry, config, cancel_token.child_token()));
        Self {
            cancel_token,
            workers: vec![(worker_id, handle)],
            promoter,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Cancels the shared token and waits for every worker and the
    /// promoter to observe it and return; does not cancel an in-flight
    /// task body.
    pub async fn shutdown(self) -> Result<u64> {
        self.cancel_token.cancel();

        let mut total_processed = 0;
        for (worker_id, handle) in self.workers {
            let processed = handle.await?;
            info!(worker_id, processed, "worker stopped cleanly");
            total_processed += processed;
        }
        self.promoter.await?;

        Ok(total_processed)
    }
}
