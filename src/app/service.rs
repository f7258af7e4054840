use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::context::AppContext;

/// A long-running process service (the HTTP router, a worker pool) spawned
/// by the app runtime under a child of its shutdown token. Modeled as a
/// named spawner rather than a trait object implementing some `Service`
/// trait, so registering one is just handing over a closure.
pub type ServiceSpawner =
    Arc<dyn Fn(AppContext, CancellationToken) -> JoinHandle<Result<()>> + Send + Sync + 'static>;

pub struct ServiceRegistration {
    name: String,
    spawner: ServiceSpawner,
}

impl ServiceRegistration {
    pub fn new<N: Into<String>>(name: N, spawner: ServiceSpawner) -> Self {
        Self {
            name: name.into(),
            spawner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spawn(&self, context: AppContext, token: CancellationToken) -> JoinHandle<Result<()>> {
        (self.spawner)(context, token)
    }
}
