use serde::Serialize;

/// Counts across broker structures for one queue, returned by
/// `QueueEngine::stats`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BrokerStats {
    pub pending: u64,
    pub retry: u64,
    pub completed: u64,
    pub dead_letter: u64,
    pub processing: u64,
}
