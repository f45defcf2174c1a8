//! Continuation chaining example.
//!
//! Runs a job on a worker thread and always releases its resources afterwards
//! with `chain_function`, whether the job succeeded or failed. A failed job
//! stays failed even though the cleanup itself succeeds.
//!
//! ```bash
//! cargo run --example chained_cleanup -p stepwise-examples
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stepwise_chain::prelude::*;
use stepwise_core::context::{TokioContext, WorkerContext};
use stepwise_core::error::StepwiseError;

async fn run_job(ctx: &TokioContext, fail: bool) {
    let released = Arc::new(AtomicBool::new(false));

    let job = ctx.run_async(move || {
        if fail {
            Err(StepwiseError::Other("task computation failed".into()))
        } else {
            Ok(42u64)
        }
    });

    let cleanup_ctx = ctx.clone();
    let flag = Arc::clone(&released);
    let result = chain_function(job, move || {
        cleanup_ctx.run_async(move || {
            flag.store(true, Ordering::SeqCst);
            tracing::info!("resources released");
            Ok("released")
        })
    })
    .await;

    println!(
        "job (fail={fail}): released={}, outcome={result:?}",
        released.load(Ordering::SeqCst)
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepwise=debug,chained_cleanup=info".into()),
        )
        .init();

    let ctx = TokioContext::current()?;
    run_job(&ctx, false).await;
    run_job(&ctx, true).await;

    Ok(())
}
