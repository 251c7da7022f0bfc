//! Retry policy for failed and timed-out dispatches.

use crate::types::BatchError;

/// Why a dispatch did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FailureCause {
    Error(BatchError),
    Timeout,
}

impl FailureCause {
    pub fn error(&self) -> Option<&BatchError> {
        match self {
            FailureCause::Error(e) => Some(e),
            FailureCause::Timeout => None,
        }
    }

    pub fn into_error(self) -> Option<BatchError> {
        match self {
            FailureCause::Error(e) => Some(e),
            FailureCause::Timeout => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Push the item back onto the tail of the pending queue.
    Requeue,
    /// Deliver a terminal failure.
    Exhausted,
}

/// Bounded retry: `max_retries` re-dispatches after the first attempt.
///
/// Failures and timeouts consume one retry each. Errors marked
/// [`permanent`](BatchError::permanent) finalize right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn decide(&self, retries: u32, error: Option<&BatchError>) -> RetryDecision {
        if error.is_some_and(|e| e.permanent) {
            return RetryDecision::Exhausted;
        }
        if retries < self.max_retries {
            RetryDecision::Requeue
        } else {
            RetryDecision::Exhausted
        }
    }
}
