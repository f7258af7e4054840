use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use taskq::app::{AppConfig, AppRuntime};
use taskq_registry::demo::register_demo_tasks;
use taskq_registry::TaskRegistryBuilder;
use taskq_worker::{WorkerConfig, WorkerPool};
use tracing::error;

#[derive(Parser)]
#[command(author, version, about = "Runs a pool of task queue workers against one queue", long_about = None)]
struct Args {
    /// Queue name to poll.
    #[arg(long, default_value = "default")]
    queue: String,

    /// Number of workers to spawn.
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Explicit worker id; only valid when workers == 1.
    #[arg(long)]
    worker_id: Option<String>,

    /// Poll interval in seconds, applied when the pending queue is empty.
    #[arg(long, default_value_t = 1)]
    poll_interval: u64,

    /// Stop after processing this many tasks (unbounded if omitted).
    #[arg(long)]
    max_tasks: Option<u64>,

    /// DEBUG, INFO, WARNING, or ERROR.
    #[arg(long, default_value = "INFO")]
    log_level: String,

    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let args = Args::parse();

    if args.worker_id.is_some() && args.workers > 1 {
        eprintln!("--worker-id is only valid when --workers=1");
        return ExitCode::FAILURE;
    }

    let mut config = match AppConfig::load_from_path(args.config.clone()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    config.observability.log_level = translate_log_level(&args.log_level).to_string();

    let registry = register_demo_tasks(TaskRegistryBuilder::new()).freeze();
    let runtime = AppRuntime::new(config, registry);

    let handle = match runtime.start().await {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("failed to start app runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let context = handle.context();
    let cancel_token = handle.cancel_token();
    let poll_interval = Duration::from_secs(args.poll_interval);

    let pool = match &args.worker_id {
        Some(worker_id) => WorkerPool::spawn_single(
            context.engine(),
            context.registry(),
            WorkerConfig {
                worker_id: worker_id.clone(),
                queue_name: args.queue.clone(),
                poll_interval,
                max_tasks_per_run: args.max_tasks,
            },
            cancel_token.clone(),
        ),
        None => WorkerPool::spawn(
            context.engine(),
            context.registry(),
            &args.queue,
            args.workers,
            poll_interval,
            args.max_tasks,
            cancel_token.clone(),
        ),
    };

    cancel_token.cancelled().await;

    match pool.shutdown().await {
        Ok(processed) => {
            tracing::info!(processed, "worker pool stopped cleanly");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "worker pool shutdown failed");
            ExitCode::FAILURE
        }
    }
}

fn translate_log_level(level: &str) -> &'static str {
    match level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}
