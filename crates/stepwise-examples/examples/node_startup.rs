//! Startup sequence example.
//!
//! Queues the steps a node runs before joining the network and executes them
//! one by one on tokio's blocking pool. Set `FAIL_AT` to a step name to see
//! the sequence stop there and skip everything after it.
//!
//! ```bash
//! cargo run --example node_startup -p stepwise-examples
//! FAIL_AT=open_ports RUST_LOG=stepwise=trace cargo run --example node_startup -p stepwise-examples
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stepwise_chain::prelude::*;
use stepwise_core::config::SequenceConfig;
use stepwise_core::context::TokioContext;
use stepwise_core::error::{Result, StepwiseError};

#[derive(Debug, Deserialize)]
struct PortRange {
    start: u16,
    end: u16,
}

fn should_fail(step: &str) -> bool {
    std::env::var("FAIL_AT").is_ok_and(|s| s == step)
}

fn prepare_datadir(args: CallArgs) -> Result<()> {
    let path: String = args.arg_as(0)?;
    if should_fail("prepare_datadir") {
        return Err(StepwiseError::Other(format!("cannot create {path}")));
    }
    std::thread::sleep(Duration::from_millis(50));
    tracing::info!(%path, "data directory ready");
    Ok(())
}

fn open_ports(args: CallArgs) -> Result<()> {
    let range: PortRange = args.kwarg_as("ports")?;
    if should_fail("open_ports") {
        return Err(StepwiseError::Other(format!(
            "ports {}-{} unavailable",
            range.start, range.end
        )));
    }
    std::thread::sleep(Duration::from_millis(50));
    tracing::info!(start = range.start, end = range.end, "ports opened");
    Ok(())
}

fn announce() -> Result<()> {
    if should_fail("announce") {
        return Err(StepwiseError::Other("no peers reachable".into()));
    }
    tracing::info!("node announced");
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepwise=debug,node_startup=info".into()),
        )
        .init();

    let config = SequenceConfig::new()
        .with_label("node-startup")
        .with_tag("provider")
        .with_metadata("node", serde_json::json!("provider-1"));

    let mut startup = Sequencer::new(TokioContext::current()?).with_config(config);
    startup
        .push(prepare_datadir, CallArgs::new().arg("/tmp/stepwise-node"))
        .push(
            open_ports,
            CallArgs::new().kwarg("ports", serde_json::json!({ "start": 40102, "end": 40104 })),
        )
        .push_named(
            "check-disk",
            |_| {
                if should_fail("check-disk") {
                    return Err(StepwiseError::Other("datadir volume is full".into()));
                }
                tracing::info!("disk space ok");
                Ok(())
            },
            CallArgs::new(),
        )
        .push_fn(announce);

    println!("Queued {} startup steps", startup.len());

    match startup.execute().await {
        Ok(()) => println!("Node started"),
        Err(StepwiseError::Step(failure)) => {
            println!(
                "Startup stopped at step #{} ({}), {} step(s) skipped: {}",
                failure.index, failure.name, failure.skipped, failure.source
            );
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
