//! Exact broker key layout, per the interface contract. Keep these in sync
//! with the spec's "Persisted broker key layout" list verbatim.

pub fn pending(queue: &str) -> String {
    format!("task_queue:pending:{queue}")
}

pub fn processing(worker_id: &str) -> String {
    format!("task_queue:processing:{worker_id}")
}

pub fn processing_pattern() -> &'static str {
    "task_queue:processing:*"
}

pub fn completed(queue: &str) -> String {
    format!("task_queue:completed:{queue}")
}

pub const RETRY: &str = "task_queue:retry";
pub const DEAD_LETTER: &str = "task_queue:dead_letter";
