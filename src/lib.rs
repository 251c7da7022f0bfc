//! # batch-throttle
//!
//! 通用批处理派发节流引擎：有界并发、单项超时、有限重试与吞吐统计。
//!
//! A generic batch-dispatch throttling engine.
//!
//! ## Overview
//!
//! Callers hand the engine a collection of opaque batches. The engine submits
//! them to an external executor (a [`WorkFactory`]) with bounded concurrency,
//! enforces a timeout per attempt, retries failed or timed-out batches up to a
//! configurable limit, and reports exactly one terminal [`BatchResult`] per
//! batch.
//!
//! The engine does no I/O and never looks inside a payload. What "success"
//! means is up to the action, which reports back through the [`Completer`]
//! carried by its [`WorkTicket`].
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`manager`] | [`ThrottleManager`], its builder and snapshots |
//! | [`config`] | [`ThrottleConfig`]: limits, timeouts, env/YAML loading |
//! | [`completer`] | Collaborator traits: factory, completer, outcome handler |
//! | [`ids`] | Batch number and request id suppliers |
//! | [`retry`] | Bounded retry policy |
//! | [`timeout`] | One-shot timer scheduling |
//! | [`types`] | Results, statuses and item errors |
//!
//! ## Guarantees
//!
//! - in-flight batches never exceed `max_in_flight`
//! - each enqueued batch gets exactly one terminal outcome, unless abandoned
//!   by [`ThrottleManager::stop_and_clear`]
//! - a completion signal racing its timeout resolves the batch once
//! - retried batches re-enter at the tail of the queue
//! - completion order is not guaranteed

pub mod completer;
pub mod config;
pub mod ids;
pub mod manager;
pub mod retry;
pub mod timeout;
pub mod types;

mod queue;
mod stats;
mod tracker;

pub use completer::{Action, Completer, OutcomeHandler, WorkFactory, WorkTicket};
pub use config::ThrottleConfig;
pub use ids::{IdSupplier, SequentialIds};
pub use manager::{ThrottleManager, ThrottleManagerBuilder, ThrottleSnapshot};
pub use retry::{RetryDecision, RetryPolicy};
pub use stats::StatsSnapshot;
pub use types::{BatchError, BatchResult, BatchStatus};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
