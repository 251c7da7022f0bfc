//! 派发循环与完成处理：准入、超时竞争、重试与终态回调。
//!
//! Dispatch loop and outcome resolution.
//!
//! Admission (pop + in-flight increment + timer arm) and resolution
//! (record claim + counter decrement + retry decision) each run in a single
//! critical section of the state lock. The record claim is what serializes a
//! completion signal against its timeout: whichever claims first owns the
//! outcome, the other finds nothing and returns.

use crate::completer::{Completer, WorkTicket};
use crate::retry::{FailureCause, RetryDecision, RetryPolicy};
use crate::tracker::{Attempt, DispatchRecord};
use crate::types::{BatchError, BatchResult, BatchStatus};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::core::{Inner, State};

#[derive(Debug)]
pub(crate) enum Signal {
    Success,
    Failed(FailureCause),
}

/// An admitted dispatch waiting for its factory call.
struct Dispatch<T> {
    payload: Arc<T>,
    ticket: WorkTicket,
    attempt: Attempt,
    delay: Duration,
}

/// Releases the pump flag if a factory or handler panics mid-loop.
struct PumpReset<'a, T>(&'a Inner<T>);

impl<T> Drop for PumpReset<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut st = self.0.state();
            st.pumping = false;
            st.repump = false;
        }
    }
}

/// Completer handed to one dispatch attempt.
struct AttemptCompleter<T> {
    inner: Weak<Inner<T>>,
    attempt: Attempt,
}

impl<T: Send + Sync + 'static> Completer for AttemptCompleter<T> {
    fn success(&self, request_id: u64) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.finish(request_id, Some(self.attempt), Signal::Success),
            None => false,
        }
    }

    fn failure(&self, request_id: u64, error: BatchError) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.finish(
                request_id,
                Some(self.attempt),
                Signal::Failed(FailureCause::Error(error)),
            ),
            None => false,
        }
    }
}

impl<T: Send + Sync + 'static> Inner<T> {
    /// Fill free concurrency slots from the pending queue.
    ///
    /// Only one pump loop runs at a time. A call made while another loop is
    /// active, including a completion signalled from inside the factory,
    /// marks `repump` and returns at once, so synchronous completions never
    /// nest frames. The active loop exits only after finding no admissible
    /// item with no `repump` pending, both checked under the lock.
    pub(super) fn pump(self: &Arc<Self>) {
        {
            let mut st = self.state();
            if st.pumping {
                st.repump = true;
                return;
            }
            st.pumping = true;
        }
        let _reset = PumpReset(&**self);

        loop {
            let dispatch = {
                let mut st = self.state();
                match self.admit_next(&mut st) {
                    Some(d) => d,
                    None if st.repump => {
                        st.repump = false;
                        continue;
                    }
                    None => {
                        st.pumping = false;
                        break;
                    }
                }
            };
            self.launch(dispatch);
        }
    }

    fn admit_next(self: &Arc<Self>, st: &mut State<T>) -> Option<Dispatch<T>> {
        if !st.tracker.has_capacity(st.config.max_in_flight) {
            return None;
        }
        let item = st.queue.pop_front()?;
        let request_id = item.request_id;
        let attempt = Attempt {
            epoch: st.epoch,
            retries: item.retries,
        };

        let weak = Arc::downgrade(self);
        let timer = self.timers.arm(st.config.timeout(), move || {
            if let Some(inner) = weak.upgrade() {
                inner.finish(
                    request_id,
                    Some(attempt),
                    Signal::Failed(FailureCause::Timeout),
                );
            }
        });

        let completer: Arc<dyn Completer> = Arc::new(AttemptCompleter {
            inner: Arc::downgrade(self),
            attempt,
        });
        let ticket = WorkTicket::new(item.batch_number, request_id, item.retries, completer);
        let payload = Arc::clone(&item.payload);

        debug!(
            request_id,
            batch_number = item.batch_number,
            retries = item.retries,
            in_flight = st.tracker.len() + 1,
            "dispatching batch"
        );
        st.tracker.admit(DispatchRecord {
            item,
            attempt,
            started_at: Instant::now(),
            timer: Some(timer),
        });

        Some(Dispatch {
            payload,
            ticket,
            attempt,
            delay: st.config.request_delay(),
        })
    }

    fn launch(self: &Arc<Self>, dispatch: Dispatch<T>) {
        if dispatch.delay.is_zero() {
            self.invoke(dispatch);
            return;
        }

        let weak = Arc::downgrade(self);
        self.timers.runtime().spawn(async move {
            tokio::time::sleep(dispatch.delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Timed out or cleared while waiting: nothing to run.
            let live = inner
                .state()
                .tracker
                .is_live(dispatch.ticket.request_id, dispatch.attempt);
            if live {
                inner.invoke(dispatch);
                inner.pump();
            }
        });
    }

    /// Call the factory outside the lock and spawn its action.
    ///
    /// A factory error resolves the attempt without pumping; the caller's
    /// loop refills the slot.
    fn invoke(self: &Arc<Self>, dispatch: Dispatch<T>) {
        let request_id = dispatch.ticket.request_id;
        match self.factory.create(&dispatch.payload, dispatch.ticket) {
            Ok(action) => {
                self.timers.runtime().spawn(action);
            }
            Err(error) => {
                warn!(request_id, error = %error, "work factory rejected batch");
                self.resolve(
                    request_id,
                    Some(dispatch.attempt),
                    Signal::Failed(FailureCause::Error(error)),
                );
            }
        }
    }

    /// Resolve a dispatch, then refill the freed slot.
    pub(super) fn finish(
        self: &Arc<Self>,
        request_id: u64,
        attempt: Option<Attempt>,
        signal: Signal,
    ) -> bool {
        let accepted = self.resolve(request_id, attempt, signal);
        self.pump();
        accepted
    }

    /// Claim the dispatch record and apply the outcome. Returns `false` when
    /// the record was already claimed, in which case nothing changes.
    fn resolve(&self, request_id: u64, attempt: Option<Attempt>, signal: Signal) -> bool {
        let terminal = {
            let mut st = self.state();
            let Some(record) = st.tracker.claim(request_id, attempt) else {
                debug!(request_id, "ignoring signal for resolved dispatch");
                return false;
            };
            // A firing timer is already done; only disarm on completion signals.
            if !matches!(signal, Signal::Failed(FailureCause::Timeout)) {
                if let Some(timer) = &record.timer {
                    timer.cancel();
                }
            }
            st.stats.record(request_id, record.started_at.elapsed());
            self.apply(&mut st, record, signal)
        };

        if let Some(result) = terminal {
            self.handler.on_outcome(result);
        }
        true
    }

    fn apply(
        &self,
        st: &mut State<T>,
        record: DispatchRecord<T>,
        signal: Signal,
    ) -> Option<BatchResult<T>> {
        let mut item = record.item;
        let cause = match signal {
            Signal::Success => {
                st.stats.record_success();
                return Some(item.into_result(BatchStatus::Success, None));
            }
            Signal::Failed(cause) => cause,
        };

        if matches!(cause, FailureCause::Timeout) {
            st.stats.record_timeout();
            warn!(
                request_id = item.request_id,
                retries = item.retries,
                "batch timed out"
            );
        }

        match RetryPolicy::new(st.config.max_retries).decide(item.retries, cause.error()) {
            RetryDecision::Requeue => {
                item.retries += 1;
                st.stats.record_retry();
                debug!(
                    request_id = item.request_id,
                    retries = item.retries,
                    "re-queueing batch"
                );
                st.queue.push_back(item);
                None
            }
            RetryDecision::Exhausted => {
                st.stats.record_failure();
                warn!(
                    request_id = item.request_id,
                    batch_number = item.batch_number,
                    retries = item.retries,
                    "batch failed permanently"
                );
                let status = match cause {
                    FailureCause::Timeout => BatchStatus::Timeout,
                    FailureCause::Error(_) => BatchStatus::Failure,
                };
                Some(item.into_result(status, cause.into_error()))
            }
        }
    }
}
