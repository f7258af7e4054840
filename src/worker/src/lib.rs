//! Worker loop, the shared retry promoter, and the pool that spawns both
//! under one [`CancellationToken`].
//!
//! Every worker and the promoter are independent `tokio` tasks, never OS
//! threads: they cooperate purely through the token and the engine's atomic
//! operations, with no worker-to-worker coordination of its own.

mod pool;
mod promoter;
mod worker_loop;

pub use pool::WorkerPool;
pub use promoter::spawn_retry_promoter;
pub use worker_loop::{run_worker, WorkerConfig};

use std::time::Duration;

/// Default poll interval when a pending queue is observed empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Retry promoter cadence: 30s on a clean pass, 60s after an error.
pub const PROMOTER_INTERVAL: Duration = Duration::from_secs(30);
pub const PROMOTER_ERROR_BACKOFF: Duration = Duration::from_secs(60);
