//! Work item and terminal result types.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Error reported for a single batch, either by the work factory or by the
/// action through its completer. Surfaced verbatim in the terminal result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BatchError {
    pub message: String,
    /// Skip remaining retries and finalize on this failure.
    pub permanent: bool,
}

impl BatchError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            permanent: false,
        }
    }

    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }
}

impl From<&str> for BatchError {
    fn from(msg: &str) -> Self {
        Self::new(msg)
    }
}

impl From<String> for BatchError {
    fn from(msg: String) -> Self {
        Self::new(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Failure,
    Timeout,
}

/// Terminal outcome of one enqueued batch. Delivered exactly once.
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    pub request_id: u64,
    pub batch_number: u64,
    pub payload: Arc<T>,
    pub status: BatchStatus,
    /// Retries consumed before this outcome.
    pub retry_count: u32,
    pub error: Option<BatchError>,
}

impl<T> BatchResult<T> {
    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

/// A queued or in-flight batch. Retries keep the same ids.
#[derive(Debug)]
pub(crate) struct WorkItem<T> {
    pub payload: Arc<T>,
    pub batch_number: u64,
    pub request_id: u64,
    pub retries: u32,
}

impl<T> WorkItem<T> {
    pub fn new(payload: T, batch_number: u64, request_id: u64) -> Self {
        Self {
            payload: Arc::new(payload),
            batch_number,
            request_id,
            retries: 0,
        }
    }

    pub fn into_result(
        self,
        status: BatchStatus,
        error: Option<BatchError>,
    ) -> BatchResult<T> {
        BatchResult {
            request_id: self.request_id,
            batch_number: self.batch_number,
            payload: self.payload,
            status,
            retry_count: self.retries,
            error,
        }
    }
}
