use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use taskq::app::{AppConfig, AppRuntime};
use taskq::http::http_service;
use taskq_registry::demo::register_demo_tasks;
use taskq_registry::TaskRegistryBuilder;

#[derive(Parser)]
#[command(author, version, about = "Task queue HTTP submission and listing API", long_about = None)]
struct Args {
    /// Optional TOML config file, overlaid on top of config/queue.toml
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let config = AppConfig::load_from_path(args.config)?;
    let registry = register_demo_tasks(TaskRegistryBuilder::new()).freeze();

    let mut runtime = AppRuntime::new(config, registry);
    runtime.register_service(http_service());

    let handle = runtime.start().await?;
    handle.join().await?;

    Ok(())
}
