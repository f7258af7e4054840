use std::sync::Arc;

use anyhow::Result;
use taskq_broker::RedisBroker;
use taskq_engine::QueueEngine;
use taskq_registry::TaskRegistry;
use taskq_store::PostgresStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::config::AppConfig;
use crate::app::context::AppContext;
use crate::app::service::ServiceRegistration;

/// Construction root. Connects the broker and record store, builds the
/// engine, and hands out an [`AppContext`] to every service it spawns
/// (the HTTP router, a worker pool) — there is no process-wide singleton
/// anywhere else in the binary.
pub struct AppRuntime {
    config: AppConfig,
    registry: TaskRegistry,
    services: Vec<ServiceRegistration>,
}

impl AppRuntime {
    pub fn new(config: AppConfig, registry: TaskRegistry) -> Self {
        Self {
            config,
            registry,
            services: Vec::new(),
        }
    }

    pub fn register_service(&mut self, service: ServiceRegistration) {
        self.services.push(service);
    }

    /// Initializes logging, connects to Redis and Postgres, installs the
    /// process-wide shutdown signal handler, and spawns every registered
    /// service under one root [`CancellationToken`].
    pub async fn start(self) -> Result<AppRuntimeHandle> {
        initialize_logging(&self.config);

        let broker = Arc::new(RedisBroker::connect(&self.config.broker.redis_url).await?);
        let store = Arc::new(
            PostgresStore::connect(&self.config.store.database_url, self.config.store.max_connections)
                .await?,
        );
        store.migrate().await?;

        let engine = QueueEngine::new(broker, store);

        let root_token = CancellationToken::new();
        let context = AppContext::new(self.config, engine, self.registry, root_token.child_token());

        install_shutdown_signal(root_token.clone());

        let mut tasks = Vec::new();
        for service in self.services {
            let handle = service.spawn(context.clone(), root_token.child_token());
            tasks.push((service.name().to_string(), handle));
        }

        info!("app runtime boot completed");

        Ok(AppRuntimeHandle {
            context,
            cancel_token: root_token,
            tasks,
        })
    }
}

pub struct AppRuntimeHandle {
    context: AppContext,
    cancel_token: CancellationToken,
    tasks: Vec<(String, JoinHandle<Result<()>>)>,
}

impl AppRuntimeHandle {
    pub fn context(&self) -> AppContext {
        self.context.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Waits for every registered service to exit on its own — normally
    /// because its shutdown token was cancelled by [`install_shutdown_signal`].
    pub async fn join(self) -> Result<()> {
        for (name, handle) in self.tasks {
            match handle.await {
                Ok(Ok(())) => info!(service = %name, "service shutdown cleanly"),
                Ok(Err(err)) => return Err(err),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    pub async fn shutdown(self) -> Result<()> {
        self.cancel_token.cancel();
        self.join().await
    }
}

fn initialize_logging(config: &AppConfig) {
    let filter = &config.observability.log_level;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter.as_str())
        .try_init();
}

/// Installs the one SIGINT/SIGTERM handler for the whole process. Workers
/// and the HTTP router never install their own — they only ever observe a
/// child of `token`.
fn install_shutdown_signal(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }

        info!("shutdown signal received, cancelling app runtime");
        token.cancel();
    });
}
