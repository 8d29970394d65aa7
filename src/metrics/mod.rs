pub mod collector;
pub mod percentiles;

pub use collector::{MetricsCollector, MetricsSnapshot};

/// One timed API operation, pushed by the handlers.
#[derive(Debug, Clone)]
pub struct Sample {
    /// e.g. "timeline_within"
    pub operation: &'static str,
    /// Microseconds spent inside sensor calls (store round-trips)
    pub store_us: u64,
    /// Total handler wall time in microseconds
    pub total_us: u64,
    /// false for queries, true for anything that mutates keys
    pub is_write: bool,
    /// false when the operation returned an error
    pub success: bool,
}
