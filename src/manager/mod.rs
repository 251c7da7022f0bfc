//! 批处理节流管理器：有界并发派发、超时、重试与统计。
//!
//! # Throttle Manager
//!
//! [`ThrottleManager`] accepts batches, dispatches them through a
//! [`WorkFactory`](crate::WorkFactory) with at most `max_in_flight` in flight,
//! arms a timeout per dispatch, retries failures and timeouts up to
//! `max_retries`, and delivers one terminal [`BatchResult`](crate::BatchResult)
//! per batch to the [`OutcomeHandler`](crate::OutcomeHandler).
//!
//! ## Lifecycle of a batch
//!
//! | Step | Trigger | Effect |
//! |------|---------|--------|
//! | queued | `enqueue` | ids assigned, pushed to the pending queue |
//! | dispatched | free slot | timer armed, factory called, action spawned |
//! | succeeded | `success` signal | terminal `Success` result |
//! | failed / timed out | `failure` signal, factory error, timer | re-queued at the tail, or terminal result once retries run out |
//! | abandoned | `stop_and_clear` | dropped silently |
//!
//! ## Example
//!
//! ```rust,no_run
//! use batch_throttle::{Action, BatchError, BatchResult, ThrottleManager, WorkTicket};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> batch_throttle::Result<()> {
//!     let manager = ThrottleManager::<String>::builder()
//!         .max_in_flight(2)
//!         .timeout(Duration::from_secs(5))
//!         .max_retries(1)
//!         .factory(|job: &String, ticket: WorkTicket| -> Result<Action, BatchError> {
//!             let job = job.clone();
//!             Ok(Box::pin(async move {
//!                 // do the work for `job`...
//!                 let _ = job;
//!                 ticket.success();
//!             }))
//!         })
//!         .on_outcome(|result: BatchResult<String>| {
//!             println!("{} -> {:?}", result.payload, result.status);
//!         })
//!         .build()?;
//!
//!     manager.enqueue(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
//!     Ok(())
//! }
//! ```

mod builder;
mod core;
mod dispatch;
mod signals;

pub use builder::ThrottleManagerBuilder;
pub use core::ThrottleManager;
pub use signals::ThrottleSnapshot;
