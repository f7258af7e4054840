//! Shared vocabulary for the task queue.
//!
//! Every other crate in this workspace (`taskq-broker`, `taskq-store`,
//! `taskq-registry`, `taskq-engine`, `taskq-worker`) depends on this crate for
//! its core types so that priority, status, and error representations stay
//! singular instead of drifting per component.

mod envelope;
mod error;
mod priority;
mod record;

pub use envelope::Envelope;
pub use error::{QueueError, QueueResult};
pub use priority::Priority;
pub use record::{NewTask, TaskRecord, TaskStatus};

/// Current envelope wire format. Bump when the envelope schema changes shape;
/// unknown fields are rejected rather than silently ignored.
pub const ENVELOPE_SCHEMA_VERSION: u8 = 1;

/// Unique identifier for a task, stable across its full lifecycle.
pub type TaskId = uuid::Uuid;
