//! Error taxonomy shared by the resilience primitives.

use std::time::Duration;
use thiserror::Error;

/// The breaker rejected a call without invoking the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit '{breaker}' is open, next probe allowed in {retry_in:?}")]
pub struct CircuitOpenError {
    /// Name of the breaker that rejected the call.
    pub breaker: String,
    /// Time left before the breaker admits a trial call.
    pub retry_in: Duration,
}

/// The deadline elapsed before the operation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {after:?}")]
pub struct TimeoutError {
    /// The deadline that was exceeded.
    pub after: Duration,
}

/// Invalid policy or pool configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A retry policy must allow at least one attempt.
    #[error("max_attempts must be at least 1 (got {0})")]
    InvalidMaxAttempts(u32),

    /// A pool must admit at least one operation at a time.
    #[error("concurrency limit must be at least 1 (got {0})")]
    InvalidConcurrencyLimit(usize),

    /// Backoff multiplier must be finite and non-negative.
    #[error("backoff multiplier must be finite and non-negative (got {0})")]
    InvalidMultiplier(f64),

    /// Jitter factor must lie in `[0, 1]`.
    #[error("jitter factor must be within [0, 1] (got {0})")]
    InvalidJitter(f64),

    /// A threshold that must be positive was zero.
    #[error("{0} must be greater than zero")]
    ZeroThreshold(&'static str),

    /// A duration that must be positive was zero.
    #[error("{0} must be a non-zero duration")]
    ZeroDuration(&'static str),
}

/// Errors surfaced by the guarded execution paths.
///
/// `Operation` carries the wrapped call's own error untouched; the other
/// variants mean the core gave up before or instead of getting a result.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The operation ran and failed.
    #[error("{0}")]
    Operation(E),

    /// The breaker rejected the call; the operation was never invoked.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// The deadline elapsed while waiting for the operation.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The call was structurally invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl<E> ResilienceError<E> {
    /// Returns true if the breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen(_))
    }

    /// Returns true if the deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout(_))
    }

    /// The wrapped operation's error, if the operation ran and failed.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            ResilienceError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Unwrap into the operation's own error, if there is one.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ResilienceError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for guarded execution.
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;
