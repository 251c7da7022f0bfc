//! Collaborator contracts: the work factory, the completion capability and
//! the terminal outcome handler.

use crate::types::{BatchError, BatchResult};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Executable unit of work produced by a [`WorkFactory`]. Spawned on the
/// manager's runtime.
pub type Action = BoxFuture<'static, ()>;

/// Capability for reporting the outcome of a dispatched batch.
///
/// Returns `true` when the signal was accepted, `false` when the dispatch was
/// already resolved (timed out, reported before, or abandoned by
/// `stop_and_clear`). Rejected signals have no effect.
pub trait Completer: Send + Sync {
    fn success(&self, request_id: u64) -> bool;
    fn failure(&self, request_id: u64, error: BatchError) -> bool;
}

/// Everything a factory needs to know about one dispatch attempt.
///
/// The ticket's completer is scoped to this attempt: after a timeout-driven
/// retry, signals from the superseded attempt are rejected.
#[derive(Clone)]
pub struct WorkTicket {
    pub batch_number: u64,
    pub request_id: u64,
    pub retry_count: u32,
    completer: Arc<dyn Completer>,
}

impl WorkTicket {
    pub fn new(
        batch_number: u64,
        request_id: u64,
        retry_count: u32,
        completer: Arc<dyn Completer>,
    ) -> Self {
        Self {
            batch_number,
            request_id,
            retry_count,
            completer,
        }
    }

    pub fn success(&self) -> bool {
        self.completer.success(self.request_id)
    }

    pub fn failure(&self, error: impl Into<BatchError>) -> bool {
        self.completer.failure(self.request_id, error.into())
    }

    pub fn completer(&self) -> Arc<dyn Completer> {
        Arc::clone(&self.completer)
    }
}

impl std::fmt::Debug for WorkTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkTicket")
            .field("batch_number", &self.batch_number)
            .field("request_id", &self.request_id)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

/// Turns a payload into an [`Action`].
///
/// Called once per dispatch attempt, retries included. An `Err` is treated as
/// a failed attempt and goes through the retry policy.
pub trait WorkFactory<T>: Send + Sync {
    fn create(&self, payload: &T, ticket: WorkTicket) -> Result<Action, BatchError>;
}

impl<T, F> WorkFactory<T> for F
where
    F: Fn(&T, WorkTicket) -> Result<Action, BatchError> + Send + Sync,
{
    fn create(&self, payload: &T, ticket: WorkTicket) -> Result<Action, BatchError> {
        self(payload, ticket)
    }
}

/// Receives exactly one terminal [`BatchResult`] per enqueued batch.
pub trait OutcomeHandler<T>: Send + Sync {
    fn on_outcome(&self, result: BatchResult<T>);
}

impl<T, F> OutcomeHandler<T> for F
where
    F: Fn(BatchResult<T>) + Send + Sync,
{
    fn on_outcome(&self, result: BatchResult<T>) {
        self(result)
    }
}
