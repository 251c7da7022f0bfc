//! 超时调度：为每次派发挂载一次性定时器。
//!
//! One-shot timers on a tokio runtime.
//!
//! Timers never block the arming thread. Cancelling a timer that already
//! fired is a no-op; the manager resolves the fire/cancel race separately by
//! claiming the dispatch record, so a late fire only ever finds nothing to do.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Cancels a pending timer.
#[derive(Debug)]
pub struct TimeoutHandle {
    abort: AbortHandle,
}

impl TimeoutHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// True once the timer fired or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutScheduler {
    runtime: Handle,
}

impl TimeoutScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Run `fire` once after `after`, unless cancelled first.
    pub fn arm<F>(&self, after: Duration, fire: F) -> TimeoutHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            fire();
        });
        TimeoutHandle {
            abort: task.abort_handle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_timer_fires() {
        let scheduler = TimeoutScheduler::new(Handle::current());
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);

        let handle = scheduler.arm(Duration::from_millis(10), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_cancelled_timer_does_not_fire() {
        let scheduler = TimeoutScheduler::new(Handle::current());
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);

        let handle = scheduler.arm(Duration::from_millis(30), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_fire_is_noop() {
        let scheduler = TimeoutScheduler::new(Handle::current());
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);

        let handle = scheduler.arm(Duration::from_millis(5), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
