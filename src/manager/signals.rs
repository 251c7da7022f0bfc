use crate::stats::StatsSnapshot;
use serde::Serialize;

/// Facts-only view of the manager for progress reporting and orchestration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThrottleSnapshot {
    pub max_in_flight: usize,
    pub in_flight: usize,
    /// Free concurrency slots.
    pub available: usize,
    pub pending: usize,
    pub stats: StatsSnapshot,
}

impl ThrottleSnapshot {
    /// Fraction of the run's batches that reached a terminal outcome.
    pub fn progress(&self) -> f64 {
        if self.stats.total_batches == 0 {
            return 0.0;
        }
        let finished = self.stats.succeeded + self.stats.failed;
        finished as f64 / self.stats.total_batches as f64
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
