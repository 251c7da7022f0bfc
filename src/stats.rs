//! 吞吐统计：记录每次完成的耗时与计数。
//!
//! Run statistics.
//!
//! Reset at the start of every `enqueue` and on `stop_and_clear`; between
//! resets the duration list only grows.

use crate::config::saturating_millis;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub(crate) struct Statistics {
    started_at: Option<Instant>,
    durations: Vec<Duration>,
    by_request: HashMap<u64, Duration>,
    total_batches: usize,
    /// Every observed attempt outcome: success, failure or timeout.
    batches_completed: usize,
    succeeded: usize,
    failed: usize,
    timed_out: usize,
    retried: usize,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run of `total_batches` items.
    pub fn begin_run(&mut self, total_batches: usize) {
        *self = Self {
            started_at: Some(Instant::now()),
            total_batches,
            ..Self::default()
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record an attempt's duration. A retried request keeps its latest duration.
    pub fn record(&mut self, request_id: u64, elapsed: Duration) {
        self.durations.push(elapsed);
        self.by_request.insert(request_id, elapsed);
        self.batches_completed += 1;
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn record_timeout(&mut self) {
        self.timed_out += 1;
    }

    pub fn record_retry(&mut self) {
        self.retried += 1;
    }

    pub fn total_batches(&self) -> usize {
        self.total_batches
    }

    pub fn batches_completed(&self) -> usize {
        self.batches_completed
    }

    pub fn total_duration(&self) -> Duration {
        self.durations
            .iter()
            .fold(Duration::ZERO, |acc, d| acc.saturating_add(*d))
    }

    pub fn average_duration(&self) -> Duration {
        if self.durations.is_empty() {
            return Duration::ZERO;
        }
        let nanos = self.total_duration().as_nanos() / self.durations.len() as u128;
        let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
        Duration::new(secs, (nanos % 1_000_000_000) as u32)
    }

    pub fn last_duration(&self) -> Duration {
        self.durations.last().copied().unwrap_or(Duration::ZERO)
    }

    pub fn duration_by_request_id(&self, request_id: u64) -> Option<Duration> {
        self.by_request.get(&request_id).copied()
    }

    /// Wall-clock time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed = self.elapsed();
        let finished = self.succeeded + self.failed;
        let throughput_per_sec = if elapsed.is_zero() {
            0.0
        } else {
            finished as f64 / elapsed.as_secs_f64()
        };
        StatsSnapshot {
            total_batches: self.total_batches,
            batches_completed: self.batches_completed,
            succeeded: self.succeeded,
            failed: self.failed,
            timed_out: self.timed_out,
            retried: self.retried,
            average_ms: saturating_millis(self.average_duration()),
            total_ms: saturating_millis(self.total_duration()),
            last_ms: saturating_millis(self.last_duration()),
            elapsed_ms: saturating_millis(elapsed),
            throughput_per_sec,
        }
    }
}

/// Point-in-time copy of the run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_batches: usize,
    pub batches_completed: usize,
    /// Terminal successes.
    pub succeeded: usize,
    /// Terminal failures, including exhausted timeouts.
    pub failed: usize,
    /// Timeout firings that won against a completion signal.
    pub timed_out: usize,
    pub retried: usize,
    pub average_ms: u64,
    pub total_ms: u64,
    pub last_ms: u64,
    pub elapsed_ms: u64,
    /// Terminal outcomes per second of wall-clock run time.
    pub throughput_per_sec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_statistics_are_zero() {
        let stats = Statistics::new();
        assert_eq!(stats.average_duration(), Duration::ZERO);
        assert_eq!(stats.total_duration(), Duration::ZERO);
        assert_eq!(stats.last_duration(), Duration::ZERO);
        assert_eq!(stats.duration_by_request_id(1), None);
        assert_eq!(stats.snapshot().throughput_per_sec, 0.0);
    }

    #[test]
    fn test_aggregates_known_durations() {
        let mut stats = Statistics::new();
        stats.begin_run(3);
        stats.record(1, Duration::from_millis(10));
        stats.record(2, Duration::from_millis(20));
        stats.record(3, Duration::from_millis(60));

        assert_eq!(stats.total_duration(), Duration::from_millis(90));
        assert_eq!(stats.average_duration(), Duration::from_millis(30));
        assert_eq!(stats.last_duration(), Duration::from_millis(60));
        assert_eq!(stats.duration_by_request_id(2), Some(Duration::from_millis(20)));
        assert_eq!(stats.batches_completed(), 3);
        assert_eq!(stats.total_batches(), 3);
    }

    #[test]
    fn test_average_uses_nanosecond_precision() {
        let mut stats = Statistics::new();
        stats.record(1, Duration::from_nanos(10));
        stats.record(2, Duration::from_nanos(13));
        assert_eq!(stats.average_duration(), Duration::from_nanos(11));

        let huge = Duration::from_secs(u64::MAX / 2);
        let mut stats = Statistics::new();
        stats.record(1, huge);
        stats.record(2, huge);
        stats.record(3, huge);
        assert!(stats.total_duration() >= huge * 2);
        assert!(stats.average_duration() >= huge / 2);
        assert_eq!(stats.snapshot().total_ms, u64::MAX);
    }

    #[test]
    fn test_retried_request_keeps_latest_duration() {
        let mut stats = Statistics::new();
        stats.record(9, Duration::from_millis(50));
        stats.record(9, Duration::from_millis(5));

        assert_eq!(stats.duration_by_request_id(9), Some(Duration::from_millis(5)));
        assert_eq!(stats.batches_completed(), 2);
        assert_eq!(stats.total_duration(), Duration::from_millis(55));
    }

    #[test]
    fn test_begin_run_resets() {
        let mut stats = Statistics::new();
        stats.begin_run(2);
        stats.record(1, Duration::from_millis(10));
        stats.record_success();
        stats.record_retry();

        stats.begin_run(4);
        let snap = stats.snapshot();
        assert_eq!(snap.total_batches, 4);
        assert_eq!(snap.batches_completed, 0);
        assert_eq!(snap.succeeded, 0);
        assert_eq!(snap.retried, 0);
        assert_eq!(snap.total_ms, 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut stats = Statistics::new();
        stats.begin_run(2);
        stats.record(1, Duration::from_millis(10));
        stats.record_failure();
        stats.record_timeout();

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_snapshot_counts() {
        let mut stats = Statistics::new();
        stats.begin_run(2);
        stats.record(1, Duration::from_millis(4));
        stats.record_timeout();
        stats.record_retry();
        stats.record(1, Duration::from_millis(6));
        stats.record_success();
        stats.record(2, Duration::from_millis(2));
        stats.record_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.batches_completed, 3);
        assert_eq!(snap.succeeded, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.timed_out, 1);
        assert_eq!(snap.retried, 1);
        assert_eq!(snap.total_ms, 12);
        assert_eq!(snap.average_ms, 4);
        assert_eq!(snap.last_ms, 2);
    }
}
