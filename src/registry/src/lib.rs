//! Task name to handler lookup.
//!
//! A process-wide mapping, populated once at startup through
//! [`TaskRegistryBuilder`] and then frozen into an immutable [`TaskRegistry`]
//! shared across workers via `Arc`. There is no runtime registration after
//! freeze: a worker that needs a new task type restarts with a new build.
//!
//! [`TaskRegistry::lookup`] returns [`Lookup`] rather than an error — an
//! unknown task name is routine input (a producer typo, a stale client), not
//! an exceptional condition, so callers branch on it like any other value.

pub mod demo;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as Json;
use taskq_domain::QueueResult;

/// A registered task body. `args`/`kwargs` mirror the envelope's positional
/// and keyword fields; the return value becomes `TaskRecord::result` on
/// success or `QueueError::TaskExecution` on failure.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn call(&self, args: &[Json], kwargs: &BTreeMap<String, Json>) -> QueueResult<Json>;
}

/// Adapts a plain async function into a [`TaskHandler`], so demo tasks don't
/// need a one-off struct each.
#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(Vec<Json>, BTreeMap<String, Json>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = QueueResult<Json>> + Send,
{
    async fn call(&self, args: &[Json], kwargs: &BTreeMap<String, Json>) -> QueueResult<Json> {
        (self)(args.to_vec(), kwargs.clone()).await
    }
}

/// Result of a registry lookup: a sum type instead of an exception, per the
/// worker loop's "branch, don't catch" control flow.
pub enum Lookup {
    Found(Arc<dyn TaskHandler>),
    Unknown(String),
}

/// Populated before worker start, then consumed by [`TaskRegistryBuilder::freeze`].
#[derive(Default)]
pub struct TaskRegistryBuilder {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, handler: impl TaskHandler + 'static) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn freeze(self) -> TaskRegistry {
        TaskRegistry {
            handlers: Arc::new(self.handlers),
        }
    }
}

/// Immutable snapshot handed to every worker. Cheap to clone (one `Arc`
/// bump); no interior mutability, so there is nothing to synchronize once
/// frozen.
#[derive(Clone)]
pub struct TaskRegistry {
    handlers: Arc<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl TaskRegistry {
    pub fn lookup(&self, name: &str) -> Lookup {
        match self.handlers.get(name) {
            Some(handler) => Lookup::Found(Arc::clone(handler)),
            None => Lookup::Unknown(name.to_string()),
        }
    }

    /// Registered task names, sorted, for `list_tasks` and diagnostics.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
