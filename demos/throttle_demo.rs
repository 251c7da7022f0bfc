//! Throttle Demo
//!
//! Dispatches a handful of simulated jobs through a `ThrottleManager`:
//! - some finish quickly, some fail once and recover on retry
//! - one hangs and is retried until its timeout budget runs out
//! - one fails with a permanent error and is not retried
//!
//! Limits can be tuned through the environment, e.g.
//! `BATCH_THROTTLE_MAX_INFLIGHT=3 BATCH_THROTTLE_TIMEOUT_MS=200`.
//!
//! Usage:
//!   RUST_LOG=batch_throttle=debug cargo run --example throttle_demo

use batch_throttle::{
    Action, BatchError, BatchResult, ThrottleConfig, ThrottleManager, WorkTicket,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum Job {
    Quick(&'static str),
    Flaky(&'static str),
    Stuck(&'static str),
    Rejected(&'static str),
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::Quick(n) | Job::Flaky(n) | Job::Stuck(n) | Job::Rejected(n) => n,
        }
    }
}

fn run_job(job: &Job, ticket: WorkTicket) -> Result<Action, BatchError> {
    let work = match job {
        Job::Quick(_) => Some(Duration::from_millis(40)),
        Job::Flaky(_) if ticket.retry_count == 0 => None,
        Job::Flaky(_) => Some(Duration::from_millis(60)),
        Job::Stuck(_) => return Ok(Box::pin(std::future::pending())),
        Job::Rejected(_) => {
            return Err(BatchError::new("payload rejected by executor").permanent())
        }
    };

    Ok(Box::pin(async move {
        match work {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                ticket.success();
            }
            None => {
                ticket.failure("transient upstream error");
            }
        }
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("batch_throttle=info")),
        )
        .init();

    println!("=== batch-throttle demo ===\n");

    let config = ThrottleConfig::default()
        .with_max_in_flight(2)
        .with_timeout(Duration::from_millis(300))
        .with_max_retries(2)
        .overlay_env()?;
    println!("config: {:?}\n", config);

    let jobs = vec![
        Job::Quick("resize-images"),
        Job::Flaky("sync-ledger"),
        Job::Quick("send-digest"),
        Job::Stuck("export-archive"),
        Job::Rejected("import-legacy"),
        Job::Quick("rebuild-index"),
    ];
    let expected = jobs.len();

    let (tx, mut rx) = mpsc::unbounded_channel::<BatchResult<Job>>();
    let manager = ThrottleManager::new(config, run_job, move |result: BatchResult<Job>| {
        let _ = tx.send(result);
    })?;

    manager.enqueue(jobs);

    let mut seen = 0;
    while let Some(result) = rx.recv().await {
        seen += 1;
        println!(
            "#{:<2} {:<16} {:?} (retries: {}, error: {})",
            result.batch_number,
            result.payload.name(),
            result.status,
            result.retry_count,
            result
                .error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("-"),
        );
        if seen == expected {
            break;
        }
    }

    let snapshot = manager.snapshot();
    println!("\nfinal snapshot:\n{}", snapshot.to_json()?);

    println!("\nidle: {}", manager.is_idle());
    Ok(())
}
