//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define resilience metrics (attempts, exhausted retries, breaker state)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `resilience_retry_attempts_total` (counter): attempts by outcome
//! - `resilience_retries_exhausted_total` (counter): calls that ran out of attempts
//! - `resilience_circuit_state` (gauge): 0=closed, 1=half-open, 2=open, per breaker
//! - `resilience_circuit_rejections_total` (counter): fail-fast rejections per breaker
//! - `resilience_timeouts_total` (counter): deadlines exceeded
//! - `resilience_pool_tasks_total` (counter): pooled tasks by outcome
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for breaker name and outcome only, to keep cardinality bounded

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder with an HTTP scrape endpoint at `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

pub fn record_attempt(success: bool) {
    ::metrics::counter!("resilience_retry_attempts_total", "outcome" => outcome_label(success)).increment(1);
}

pub fn record_retries_exhausted() {
    ::metrics::counter!("resilience_retries_exhausted_total").increment(1);
}

pub fn record_circuit_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    ::metrics::gauge!("resilience_circuit_state", "breaker" => breaker.to_string()).set(value);
}

pub fn record_circuit_rejection(breaker: &str) {
    ::metrics::counter!("resilience_circuit_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_timeout() {
    ::metrics::counter!("resilience_timeouts_total").increment(1);
}

pub fn record_pool_task(success: bool) {
    ::metrics::counter!("resilience_pool_tasks_total", "outcome" => outcome_label(success)).increment(1);
}
