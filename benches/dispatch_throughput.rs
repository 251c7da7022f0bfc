//! Benchmarks for batch dispatch throughput
//!
//! This benchmark measures:
//! - End-to-end dispatch of instantly completing batches
//! - Overhead of the retry path for failing batches
//! - Effect of the concurrency limit on a run

use batch_throttle::{Action, BatchError, BatchResult, ThrottleManager, WorkTicket};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::Notify;

/// Dispatch `count` batches and wait until every one has a terminal outcome.
async fn run_batches(count: usize, max_in_flight: usize, fail: bool) {
    let done = Arc::new(AtomicUsize::new(0));
    let notify = Arc::new(Notify::new());

    let counter = Arc::clone(&done);
    let waker = Arc::clone(&notify);
    let manager = ThrottleManager::<u64>::builder()
        .max_in_flight(max_in_flight)
        .max_retries(2)
        .factory(move |_: &u64, ticket: WorkTicket| -> Result<Action, BatchError> {
            Ok(Box::pin(async move {
                if fail {
                    ticket.failure("bench failure");
                } else {
                    ticket.success();
                }
            }))
        })
        .on_outcome(move |_: BatchResult<u64>| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 == count {
                waker.notify_one();
            }
        })
        .build()
        .unwrap();

    manager.enqueue(0..count as u64);
    notify.notified().await;
    black_box(manager.stats());
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatch");

    for count in [100usize, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("success", count), &count, |b, &n| {
            b.to_async(&rt).iter(|| run_batches(n, 8, false))
        });
        group.bench_with_input(BenchmarkId::new("retry_exhausted", count), &count, |b, &n| {
            b.to_async(&rt).iter(|| run_batches(n, 8, true))
        });
    }

    group.finish();
}

fn bench_concurrency_limit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("max_in_flight");
    group.throughput(Throughput::Elements(500));

    for limit in [1usize, 4, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(limit), &limit, |b, &limit| {
            b.to_async(&rt).iter(|| run_batches(500, limit, false))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_concurrency_limit);
criterion_main!(benches);
