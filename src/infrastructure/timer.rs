use crate::types::{DEFAULT_RECONNECT_FALLBACK, default_reconnect_intervals};
use std::time::Duration;

/// Reconnect delay table, indexed by attempt and clamped to its last entry
#[derive(Debug, Clone)]
pub struct Timer {
    intervals: Vec<Duration>,
}

impl Timer {
    pub fn new(intervals: Vec<Duration>) -> Self {
        Self { intervals }
    }

    /// Get the delay to wait before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.intervals
            .get(attempt as usize)
            .or_else(|| self.intervals.last())
            .copied()
            .unwrap_or(Duration::from_millis(DEFAULT_RECONNECT_FALLBACK))
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(default_reconnect_intervals())
    }
}
