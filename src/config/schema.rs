//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the resilience core.
//! All types derive Serde traits for deserialization from config files.
//! Durations are expressed in milliseconds on disk and converted to
//! `Duration` by the runtime types that consume them.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Retry policy applied to single calls and pooled tasks.
    pub retry: RetryConfig,

    /// Circuit breaker thresholds.
    pub circuit: BreakerConfig,

    /// Bounded-parallelism settings.
    pub pool: PoolConfig,

    /// Deadlines for guarded operations.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of invocations per call (first try included).
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,

    /// Maximum delay between attempts in milliseconds.
    pub max_delay_ms: u64,

    /// Exponential growth factor applied per attempt.
    pub backoff_multiplier: f64,

    /// Jitter amplitude as a fraction of the delay.
    /// e.g., 0.1 for +/-10%.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Time the circuit stays open before a trial call, in milliseconds.
    pub open_duration_ms: u64,

    /// Successful trial calls required to close the circuit again.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration_ms: 30_000,
            success_threshold: 2,
        }
    }
}

/// Concurrency pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum operations in flight at once.
    pub concurrency_limit: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single remote operation in milliseconds.
    pub operation_ms: u64,

    /// Deadline for a confirmation polling loop in milliseconds.
    pub confirmation_ms: u64,

    /// Interval between confirmation polls in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            operation_ms: 10_000,
            confirmation_ms: 120_000,
            poll_interval_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
