//! Pending queue of not-yet-dispatched work.

use crate::types::WorkItem;
use std::collections::VecDeque;

/// Unbounded FIFO shared by fresh submissions and retries.
///
/// Not synchronized on its own; it lives inside the manager's state lock so
/// that popping and in-flight admission happen in one critical section.
#[derive(Debug)]
pub(crate) struct PendingQueue<T> {
    items: VecDeque<WorkItem<T>>,
}

impl<T> PendingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, item: WorkItem<T>) {
        self.items.push_back(item);
    }

    pub fn pop_front(&mut self) -> Option<WorkItem<T>> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop everything queued, returning how many items were abandoned.
    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }
}
