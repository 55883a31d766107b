//! resilient-call driver.
//!
//! Runs a simulated flaky operation through a [`RetryableService`] so the
//! breaker and retry settings of a config file can be tried out.
//!
//! ```text
//! resilient-call --config resilience.toml --calls 6 --fail-first 4
//! ```

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use resilient_call::config::{load_config, ResilienceConfig};
use resilient_call::lifecycle::cancel_on_ctrl_c;
use resilient_call::observability::init_logging;
use resilient_call::resilience::{BreakerSnapshot, CallContext, RetryError, RetryableService};

#[derive(Parser)]
#[command(name = "resilient-call")]
#[command(about = "Drive a simulated flaky operation through a circuit breaker with retries", long_about = None)]
struct Cli {
    /// TOML config file (defaults are used when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of guarded calls to make.
    #[arg(long, default_value_t = 5)]
    calls: u32,

    /// The operation fails on this many invocations before recovering.
    #[arg(long, default_value_t = 2)]
    fail_first: u32,

    /// Simulated latency of each invocation.
    #[arg(long, default_value_t = 20)]
    latency_ms: u64,

    /// Overall deadline for the whole run.
    #[arg(long)]
    deadline_ms: Option<u64>,
}

#[derive(Debug, Error)]
#[error("simulated failure on invocation {0}")]
struct SimulatedFailure(u32);

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Ok,
    CircuitOpen,
    Cancelled,
    Exhausted,
}

#[derive(Serialize)]
struct CallReport {
    call: u32,
    outcome: Outcome,
    attempts: Option<u32>,
    detail: String,
}

#[derive(Serialize)]
struct Summary {
    invocations: u32,
    calls: Vec<CallReport>,
    breaker: BreakerSnapshot,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };
    init_logging(&config.observability)?;

    tracing::info!(
        breaker = %config.breaker.name,
        max_failures = config.breaker.max_failures,
        reset_timeout_ms = config.breaker.reset_timeout_ms,
        max_retries = config.retry.max_retries,
        retry_delay_ms = config.retry.retry_delay_ms,
        "Configuration loaded"
    );

    let mut ctx = CallContext::new();
    if let Some(ms) = cli.deadline_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }
    let _signals = cancel_on_ctrl_c(&ctx);

    let service = RetryableService::from_config(&config);
    let invocations = Arc::new(AtomicU32::new(0));
    let latency = Duration::from_millis(cli.latency_ms);
    let mut reports = Vec::with_capacity(cli.calls as usize);

    for call in 1..=cli.calls {
        let result = service
            .call_with_retry(&ctx, || {
                let invocations = invocations.clone();
                let fail_first = cli.fail_first;
                async move {
                    tokio::time::sleep(latency).await;
                    let n = invocations.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= fail_first {
                        Err(SimulatedFailure(n))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        let report = match result {
            Ok(n) => CallReport {
                call,
                outcome: Outcome::Ok,
                attempts: None,
                detail: format!("succeeded on invocation {n}"),
            },
            Err(e) => {
                let outcome = match &e {
                    RetryError::CircuitOpen(_) => Outcome::CircuitOpen,
                    RetryError::Cancelled { .. } => Outcome::Cancelled,
                    RetryError::Exhausted { .. } => Outcome::Exhausted,
                };
                CallReport {
                    call,
                    outcome,
                    attempts: e.attempts(),
                    detail: e.to_string(),
                }
            }
        };

        tracing::info!(
            call,
            state = %service.state(),
            detail = %report.detail,
            "Call finished"
        );
        reports.push(report);

        if ctx.is_done() {
            break;
        }
    }

    // Stops the signal task.
    ctx.cancel();

    let summary = Summary {
        invocations: invocations.load(Ordering::SeqCst),
        calls: reports,
        breaker: service.breaker().snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
