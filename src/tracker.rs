//! In-flight tracking: the dispatch records and the counter bounding them.

use crate::timeout::TimeoutHandle;
use crate::types::WorkItem;
use std::collections::HashMap;
use std::time::Instant;

/// Identifies one dispatch of a request: the manager epoch it belongs to and
/// the retry count it was dispatched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Attempt {
    pub epoch: u64,
    pub retries: u32,
}

#[derive(Debug)]
pub(crate) struct DispatchRecord<T> {
    pub item: WorkItem<T>,
    pub attempt: Attempt,
    pub started_at: Instant,
    pub timer: Option<TimeoutHandle>,
}

/// `request_id -> DispatchRecord`, plus the in-flight count.
///
/// `count` always equals `records.len()`; it is kept as its own field so the
/// admission check reads like the bound it enforces.
#[derive(Debug)]
pub(crate) struct InFlightTracker<T> {
    records: HashMap<u64, DispatchRecord<T>>,
    count: usize,
}

impl<T> InFlightTracker<T> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            count: 0,
        }
    }

    pub fn has_capacity(&self, max_in_flight: usize) -> bool {
        self.count < max_in_flight
    }

    /// Register a dispatch. A request id has at most one live record.
    pub fn admit(&mut self, record: DispatchRecord<T>) {
        let id = record.item.request_id;
        if let Some(stale) = self.records.insert(id, record) {
            // Only reachable with a supplier that repeats request ids.
            if let Some(timer) = stale.timer {
                timer.cancel();
            }
            tracing::warn!(request_id = id, "duplicate request id replaced a live dispatch");
        } else {
            self.count += 1;
        }
        debug_assert_eq!(self.count, self.records.len());
    }

    /// Check-and-remove. `attempt = None` accepts whichever attempt is live.
    ///
    /// This is the only way a record leaves the tracker besides [`clear`](Self::clear),
    /// so whoever gets `Some` here owns the outcome of that dispatch.
    pub fn claim(&mut self, request_id: u64, attempt: Option<Attempt>) -> Option<DispatchRecord<T>> {
        let live = self.records.get(&request_id)?;
        if attempt.is_some_and(|a| a != live.attempt) {
            return None;
        }
        let record = self.records.remove(&request_id)?;
        self.count -= 1;
        debug_assert_eq!(self.count, self.records.len());
        Some(record)
    }

    pub fn is_live(&self, request_id: u64, attempt: Attempt) -> bool {
        self.records
            .get(&request_id)
            .is_some_and(|r| r.attempt == attempt)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Cancel every timer and forget every record.
    pub fn clear(&mut self) -> usize {
        let n = self.count;
        for (_, record) in self.records.drain() {
            if let Some(timer) = record.timer {
                timer.cancel();
            }
        }
        self.count = 0;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(request_id: u64, epoch: u64, retries: u32) -> DispatchRecord<&'static str> {
        let mut item = WorkItem::new("x", request_id, request_id);
        item.retries = retries;
        DispatchRecord {
            item,
            attempt: Attempt { epoch, retries },
            started_at: Instant::now(),
            timer: None,
        }
    }

    #[test]
    fn test_tracker_capacity() {
        let mut tracker = InFlightTracker::new();
        assert!(tracker.has_capacity(2));
        tracker.admit(record(1, 0, 0));
        tracker.admit(record(2, 0, 0));
        assert!(!tracker.has_capacity(2));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_tracker_claim_once() {
        let mut tracker = InFlightTracker::new();
        tracker.admit(record(7, 0, 0));

        assert!(tracker.claim(7, None).is_some());
        assert!(tracker.claim(7, None).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_tracker_rejects_stale_attempt() {
        let mut tracker = InFlightTracker::new();
        tracker.admit(record(7, 0, 1));

        // Signal from the first attempt arrives after the retry was dispatched
        let stale = Attempt { epoch: 0, retries: 0 };
        assert!(tracker.claim(7, Some(stale)).is_none());
        assert_eq!(tracker.len(), 1);

        let current = Attempt { epoch: 0, retries: 1 };
        assert!(tracker.is_live(7, current));
        assert!(tracker.claim(7, Some(current)).is_some());
    }

    #[test]
    fn test_tracker_rejects_other_epoch() {
        let mut tracker = InFlightTracker::new();
        tracker.admit(record(7, 1, 0));
        assert!(tracker.claim(7, Some(Attempt { epoch: 0, retries: 0 })).is_none());
    }

    #[test]
    fn test_tracker_duplicate_id_keeps_count() {
        let mut tracker = InFlightTracker::new();
        tracker.admit(record(1, 0, 0));
        tracker.admit(record(1, 0, 0));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_tracker_clear() {
        let mut tracker = InFlightTracker::new();
        tracker.admit(record(1, 0, 0));
        tracker.admit(record(2, 0, 0));
        assert_eq!(tracker.clear(), 2);
        assert!(tracker.is_empty());
        assert!(tracker.claim(1, None).is_none());
    }
}
