use std::sync::Arc;

use taskq_engine::QueueEngine;
use taskq_registry::TaskRegistry;
use tokio_util::sync::CancellationToken;

use crate::app::config::AppConfig;

/// Cheaply-cloneable handle shared by the HTTP router and the CLI binaries.
/// Carries no interior mutability of its own; the engine and registry it
/// wraps own whatever synchronization they need.
#[derive(Clone)]
pub struct AppContext {
    shared: Arc<SharedState>,
    shutdown: CancellationToken,
}

struct SharedState {
    config: AppConfig,
    engine: QueueEngine,
    registry: TaskRegistry,
}

impl AppContext {
    pub(crate) fn new(
        config: AppConfig,
        engine: QueueEngine,
        registry: TaskRegistry,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(SharedState {
                config,
                engine,
                registry,
            }),
            shutdown,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.shared.config
    }

    pub fn engine(&self) -> QueueEngine {
        self.shared.engine.clone()
    }

    pub fn registry(&self) -> TaskRegistry {
        self.shared.registry.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
