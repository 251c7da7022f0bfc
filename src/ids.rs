//! Identifier suppliers for batch numbers and request ids.

use std::sync::atomic::{AtomicU64, Ordering};

/// Produces a fresh identifier on every call.
///
/// The manager calls each supplier once per enqueued item; retries reuse the
/// identifiers assigned at enqueue time.
pub trait IdSupplier: Send + Sync {
    fn next_id(&self) -> u64;
}

impl<F> IdSupplier for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn next_id(&self) -> u64 {
        self()
    }
}

/// Monotonic counter, the default supplier for both id kinds.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSupplier for SequentialIds {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
