//! Process-wide tally of recoverable scrape failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, monotonically increasing incident counter.
///
/// Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct IncidentCounter {
    count: Arc<AtomicU64>,
}

impl IncidentCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one incident and return the new total.
    pub fn record(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current total.
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
