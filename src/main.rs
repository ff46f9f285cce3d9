//! circle-resilience demo runner.
//!
//! Drives the resilience core against a simulated ledger so its behaviour
//! (retries, breaker transitions, deadlines) can be observed end to end.
//!
//! ```text
//! contributions:  member → submit (deadline) → poll confirmations (deadline)
//!                 each member retried independently, N in flight
//! breaker:        repeated calls to a dependency that fails, then recovers
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use circle_resilience::config::{load_or_default, ResilienceConfig};
use circle_resilience::observability::{logging, metrics};
use circle_resilience::resilience::{
    poll_until, with_timeout, CircuitBreaker, CircuitConfig, CircuitSnapshot, PooledRetryRunner,
    ResilienceError, RetryPolicy, TimeoutError,
};

const REQUIRED_CONFIRMATIONS: u64 = 3;

#[derive(Parser)]
#[command(name = "circle-resilience")]
#[command(about = "Exercise the resilience core against a simulated ledger", long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit simulated circle contributions through the pooled retry runner
    Contributions {
        #[arg(long, default_value_t = 12)]
        count: usize,

        /// Probability that a single submission fails
        #[arg(long, default_value_t = 0.3)]
        failure_rate: f64,

        /// Simulated block time in milliseconds
        #[arg(long, default_value_t = 200)]
        block_ms: u64,
    },
    /// Drive a circuit breaker against a dependency that fails, then recovers
    Breaker {
        #[arg(long, default_value_t = 12)]
        calls: u32,

        /// Pause between calls in milliseconds
        #[arg(long, default_value_t = 250)]
        pause_ms: u64,

        /// Override the configured open duration in milliseconds
        #[arg(long)]
        open_ms: Option<u64>,
    },
}

#[derive(Debug, Error)]
enum LedgerError {
    #[error("ledger congested")]
    Congested,

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    fn is_transient(&self) -> bool {
        !matches!(self, LedgerError::Rejected(_))
    }
}

impl From<ResilienceError<LedgerError>> for LedgerError {
    fn from(err: ResilienceError<LedgerError>) -> Self {
        match err {
            ResilienceError::Operation(e) => e,
            ResilienceError::Timeout(t) => LedgerError::Timeout(t),
            other => LedgerError::Unavailable(other.to_string()),
        }
    }
}

struct Submission {
    submitted_at: Instant,
}

/// In-memory stand-in for the savings-circle contract.
struct SimulatedLedger {
    failure_rate: f64,
    block_time: Duration,
}

impl SimulatedLedger {
    async fn submit(&self, member: usize) -> Result<Submission, LedgerError> {
        tokio::time::sleep(Duration::from_millis(fastrand::u64(20..120))).await;

        let roll = fastrand::f64();
        if roll < self.failure_rate * 0.1 {
            return Err(LedgerError::Rejected(format!("member {member} has insufficient allowance")));
        }
        if roll < self.failure_rate {
            return Err(LedgerError::Congested);
        }
        Ok(Submission {
            submitted_at: Instant::now(),
        })
    }

    async fn confirmations(&self, submission: &Submission) -> Result<u64, LedgerError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let block_ms = self.block_time.as_millis().max(1);
        Ok((submission.submitted_at.elapsed().as_millis() / block_ms) as u64)
    }
}

#[derive(Serialize)]
struct ContributionReport {
    member: usize,
    success: bool,
    attempts: u32,
    confirmations: Option<u64>,
    error: Option<String>,
}

#[derive(Serialize)]
struct BreakerCallReport {
    call: u32,
    outcome: &'static str,
    snapshot: CircuitSnapshot,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("circle-resilience v0.1.0 starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::Contributions {
            count,
            failure_rate,
            block_ms,
        } => {
            let ledger = SimulatedLedger {
                failure_rate: failure_rate.clamp(0.0, 1.0),
                block_time: Duration::from_millis(block_ms),
            };
            let report = run_contributions(&config, &ledger, count).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Breaker {
            calls,
            pause_ms,
            open_ms,
        } => {
            let mut circuit = CircuitConfig::from(&config.circuit);
            if let Some(ms) = open_ms {
                circuit.open_duration = Duration::from_millis(ms);
            }
            let report = run_breaker(circuit, calls, Duration::from_millis(pause_ms)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    tracing::info!("Done");
    Ok(())
}

async fn run_contributions(
    config: &ResilienceConfig,
    ledger: &SimulatedLedger,
    count: usize,
) -> Result<Vec<ContributionReport>, Box<dyn std::error::Error>> {
    let policy = RetryPolicy::builder()
        .max_attempts(config.retry.max_attempts)
        .initial_delay(Duration::from_millis(config.retry.initial_delay_ms))
        .max_delay(Duration::from_millis(config.retry.max_delay_ms))
        .backoff_multiplier(config.retry.backoff_multiplier)
        .jitter_factor(config.retry.jitter_factor)
        .retry_if(LedgerError::is_transient)
        .on_retry(|e: &LedgerError, attempt| {
            tracing::info!(attempt, error = %e, "Retrying contribution");
        })
        .build()?;
    let runner = PooledRetryRunner::new(policy, config.pool.concurrency_limit)?;

    let operation_timeout = Duration::from_millis(config.timeouts.operation_ms);
    let confirmation_timeout = Duration::from_millis(config.timeouts.confirmation_ms);
    let poll_interval = Duration::from_millis(config.timeouts.poll_interval_ms);

    let tasks: Vec<_> = (0..count)
        .map(move |member| {
            move || async move {
                let submission = with_timeout(ledger.submit(member), operation_timeout).await?;
                let confirmations = poll_until(
                    || ledger.confirmations(&submission),
                    |c| *c >= REQUIRED_CONFIRMATIONS,
                    poll_interval,
                    confirmation_timeout,
                )
                .await?;
                Ok::<_, LedgerError>(confirmations)
            }
        })
        .collect();

    let results = runner.run(tasks).await;

    Ok(results
        .into_iter()
        .map(|r| ContributionReport {
            member: r.index,
            success: r.is_success(),
            attempts: r.attempts,
            confirmations: r.value().copied(),
            error: r.error().map(ToString::to_string),
        })
        .collect())
}

async fn run_breaker(
    circuit: CircuitConfig,
    calls: u32,
    pause: Duration,
) -> Result<Vec<BreakerCallReport>, Box<dyn std::error::Error>> {
    let breaker = CircuitBreaker::new("ledger-rpc", circuit)?;
    breaker.on_transition(|t| {
        tracing::info!(breaker = %t.breaker, from = %t.from, to = %t.to, "Breaker transition observed");
    });

    let invocations = AtomicU32::new(0);
    let outage = calls / 2;
    let mut report = Vec::with_capacity(calls as usize);

    for call in 1..=calls {
        let result = breaker
            .execute(|| async {
                let n = invocations.fetch_add(1, Ordering::SeqCst);
                if n < outage {
                    Err(LedgerError::Unavailable("connection refused".into()))
                } else {
                    Ok(())
                }
            })
            .await;

        let outcome = match result {
            Ok(()) => "ok",
            Err(ResilienceError::CircuitOpen(_)) => "rejected",
            Err(_) => "failed",
        };
        report.push(BreakerCallReport {
            call,
            outcome,
            snapshot: breaker.snapshot(),
        });

        tokio::time::sleep(pause).await;
    }

    Ok(report)
}
