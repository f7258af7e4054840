use taskq_engine::QueueEngine;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{PROMOTER_ERROR_BACKOFF, PROMOTER_INTERVAL};

/// Spawns the single retry promoter shared by every worker in the process:
/// one background task per app runtime, not one per worker.
pub fn spawn_retry_promoter(engine: QueueEngine, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = PROMOTER_INTERVAL;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => break,
            }

            let report = engine.promote_retries().await;
            interval = if report.errored {
                PROMOTER_ERROR_BACKOFF
            } else {
                if report.promoted == 0 {
                    debug!("retry promoter pass: nothing due");
                }
                PROMOTER_INTERVAL
            };
        }
    })
}
