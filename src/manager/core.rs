use crate::completer::{Completer, OutcomeHandler, WorkFactory};
use crate::config::{saturating_millis, ThrottleConfig};
use crate::ids::IdSupplier;
use crate::queue::PendingQueue;
use crate::stats::{Statistics, StatsSnapshot};
use crate::timeout::TimeoutScheduler;
use crate::tracker::InFlightTracker;
use crate::types::{BatchError, WorkItem};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::info;

use super::builder::ThrottleManagerBuilder;
use super::dispatch::Signal;
use super::signals::ThrottleSnapshot;
use crate::retry::FailureCause;

/// All mutable shared state, guarded by one lock.
pub(super) struct State<T> {
    pub config: ThrottleConfig,
    pub queue: PendingQueue<T>,
    pub tracker: InFlightTracker<T>,
    pub stats: Statistics,
    /// Bumped by `stop_and_clear`; completers from earlier epochs are rejected.
    pub epoch: u64,
    /// A pump loop is running somewhere up the stack or on another thread.
    pub pumping: bool,
    /// Set by a pump call that found `pumping`; the running loop goes round again.
    pub repump: bool,
}

pub(super) struct Inner<T> {
    state: Mutex<State<T>>,
    pub factory: Arc<dyn WorkFactory<T>>,
    pub handler: Arc<dyn OutcomeHandler<T>>,
    pub batch_ids: Arc<dyn IdSupplier>,
    pub request_ids: Arc<dyn IdSupplier>,
    pub timers: TimeoutScheduler,
}

impl<T> Inner<T> {
    pub fn new(
        config: ThrottleConfig,
        factory: Arc<dyn WorkFactory<T>>,
        handler: Arc<dyn OutcomeHandler<T>>,
        batch_ids: Arc<dyn IdSupplier>,
        request_ids: Arc<dyn IdSupplier>,
        timers: TimeoutScheduler,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                config,
                queue: PendingQueue::new(),
                tracker: InFlightTracker::new(),
                stats: Statistics::new(),
                epoch: 0,
                pumping: false,
                repump: false,
            }),
            factory,
            handler,
            batch_ids,
            request_ids,
            timers,
        }
    }

    /// Every critical section leaves the state consistent, so a poisoned
    /// lock is still safe to use.
    pub fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bounded-concurrency batch dispatcher.
///
/// Cheap to clone; clones share the same queue, in-flight set and statistics.
///
/// `enqueue` resets the run statistics, so overlapping runs must be
/// serialized by the caller.
pub struct ThrottleManager<T> {
    pub(super) inner: Arc<Inner<T>>,
}

impl<T> Clone for ThrottleManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> ThrottleManager<T> {
    pub fn builder() -> ThrottleManagerBuilder<T> {
        ThrottleManagerBuilder::new()
    }

    /// Build with default id suppliers on the current tokio runtime.
    pub fn new<F, H>(config: ThrottleConfig, factory: F, handler: H) -> crate::Result<Self>
    where
        F: WorkFactory<T> + 'static,
        H: OutcomeHandler<T> + 'static,
    {
        ThrottleManagerBuilder::new()
            .config(config)
            .factory(factory)
            .on_outcome(handler)
            .build()
    }

    /// Queue batches and start dispatching up to `max_in_flight` of them.
    ///
    /// An empty collection changes nothing.
    pub fn enqueue<I>(&self, batches: I)
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<WorkItem<T>> = batches
            .into_iter()
            .map(|payload| {
                WorkItem::new(
                    payload,
                    self.inner.batch_ids.next_id(),
                    self.inner.request_ids.next_id(),
                )
            })
            .collect();
        if items.is_empty() {
            return;
        }

        let count = items.len();
        {
            let mut st = self.inner.state();
            st.stats.begin_run(count);
            for item in items {
                st.queue.push_back(item);
            }
        }
        info!(count, "enqueued batches");
        self.inner.pump();
    }

    /// Report success for the live dispatch of `request_id`.
    pub fn complete_success(&self, request_id: u64) -> bool {
        self.inner.finish(request_id, None, Signal::Success)
    }

    /// Report failure for the live dispatch of `request_id`; the retry policy
    /// decides whether it is re-queued or finalized.
    pub fn complete_failure(&self, request_id: u64, error: impl Into<BatchError>) -> bool {
        self.inner.finish(
            request_id,
            None,
            Signal::Failed(FailureCause::Error(error.into())),
        )
    }

    /// Abandon queued work, cancel all timers, forget in-flight dispatches and
    /// reset statistics. No callbacks fire for anything dropped here.
    ///
    /// Actions already running are not interrupted; their completion signals
    /// are ignored.
    pub fn stop_and_clear(&self) {
        let (abandoned, cancelled) = {
            let mut st = self.inner.state();
            st.epoch += 1;
            let abandoned = st.queue.clear();
            let cancelled = st.tracker.clear();
            st.stats.reset();
            (abandoned, cancelled)
        };
        info!(abandoned, cancelled, "stopped and cleared");
    }

    pub fn config(&self) -> ThrottleConfig {
        self.inner.state().config.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.state().config.max_in_flight
    }

    /// Raising the limit dispatches queued work right away; lowering it lets
    /// in-flight work drain below the new bound.
    pub fn set_max_in_flight(&self, n: usize) {
        self.inner.state().config.max_in_flight = n.max(1);
        self.inner.pump();
    }

    pub fn timeout(&self) -> Duration {
        self.inner.state().config.timeout()
    }

    /// Applies to dispatches made after this call.
    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.state().config.timeout_ms = saturating_millis(timeout).max(1);
    }

    pub fn max_retries(&self) -> u32 {
        self.inner.state().config.max_retries
    }

    pub fn set_max_retries(&self, retries: u32) {
        self.inner.state().config.max_retries = retries;
    }

    pub fn request_delay(&self) -> Duration {
        self.inner.state().config.request_delay()
    }

    pub fn set_request_delay(&self, delay: Duration) {
        self.inner.state().config.request_delay_ms = saturating_millis(delay);
    }

    pub fn in_flight(&self) -> usize {
        self.inner.state().tracker.len()
    }

    pub fn pending(&self) -> usize {
        self.inner.state().queue.len()
    }

    /// Nothing queued and nothing in flight.
    pub fn is_idle(&self) -> bool {
        let st = self.inner.state();
        st.queue.is_empty() && st.tracker.is_empty()
    }

    pub fn total_batches(&self) -> usize {
        self.inner.state().stats.total_batches()
    }

    pub fn batches_completed(&self) -> usize {
        self.inner.state().stats.batches_completed()
    }

    /// Zero until something completes.
    pub fn average_duration(&self) -> Duration {
        self.inner.state().stats.average_duration()
    }

    pub fn total_duration(&self) -> Duration {
        self.inner.state().stats.total_duration()
    }

    pub fn last_duration(&self) -> Duration {
        self.inner.state().stats.last_duration()
    }

    pub fn duration_by_request_id(&self, request_id: u64) -> Option<Duration> {
        self.inner.state().stats.duration_by_request_id(request_id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.state().stats.snapshot()
    }

    pub fn snapshot(&self) -> ThrottleSnapshot {
        let st = self.inner.state();
        let max_in_flight = st.config.max_in_flight;
        let in_flight = st.tracker.len();
        ThrottleSnapshot {
            max_in_flight,
            in_flight,
            available: max_in_flight.saturating_sub(in_flight),
            pending: st.queue.len(),
            stats: st.stats.snapshot(),
        }
    }
}

impl<T: Send + Sync + 'static> Completer for ThrottleManager<T> {
    fn success(&self, request_id: u64) -> bool {
        self.complete_success(request_id)
    }

    fn failure(&self, request_id: u64, error: BatchError) -> bool {
        self.complete_failure(request_id, error)
    }
}

impl<T> std::fmt::Debug for ThrottleManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.state();
        f.debug_struct("ThrottleManager")
            .field("config", &st.config)
            .field("pending", &st.queue.len())
            .field("in_flight", &st.tracker.len())
            .finish()
    }
}
