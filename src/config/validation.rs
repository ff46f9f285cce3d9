//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts >= 1, thresholds > 0, jitter in [0, 1])
//! - Validate addresses used by observability endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ResilienceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be at least {min} (got {value})")]
    TooSmall {
        field: &'static str,
        min: u64,
        value: u64,
    },

    #[error("{field} must be a finite, non-negative number (got {value})")]
    NotNonNegative { field: &'static str, value: f64 },

    #[error("{field} must be within [0, 1] (got {value})")]
    NotFraction { field: &'static str, value: f64 },

    #[error("invalid metrics address '{0}'")]
    InvalidAddress(String),
}

/// Check every semantic constraint, collecting all violations.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut at_least = |field: &'static str, min: u64, value: u64| {
        if value < min {
            errors.push(ValidationError::TooSmall { field, min, value });
        }
    };
    at_least("retry.max_attempts", 1, config.retry.max_attempts as u64);
    at_least("circuit.failure_threshold", 1, config.circuit.failure_threshold as u64);
    at_least("circuit.success_threshold", 1, config.circuit.success_threshold as u64);
    at_least("circuit.open_duration_ms", 1, config.circuit.open_duration_ms);
    at_least("pool.concurrency_limit", 1, config.pool.concurrency_limit as u64);
    at_least("timeouts.operation_ms", 1, config.timeouts.operation_ms);
    at_least("timeouts.confirmation_ms", 1, config.timeouts.confirmation_ms);
    at_least("timeouts.poll_interval_ms", 1, config.timeouts.poll_interval_ms);

    let multiplier = config.retry.backoff_multiplier;
    if !multiplier.is_finite() || multiplier < 0.0 {
        errors.push(ValidationError::NotNonNegative {
            field: "retry.backoff_multiplier",
            value: multiplier,
        });
    }

    let jitter = config.retry.jitter_factor;
    if !(0.0..=1.0).contains(&jitter) {
        errors.push(ValidationError::NotFraction {
            field: "retry.jitter_factor",
            value: jitter,
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ResilienceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ResilienceConfig::default();
        config.retry.max_attempts = 0;
        config.retry.jitter_factor = 2.0;
        config.pool.concurrency_limit = 0;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::TooSmall {
            field: "retry.max_attempts",
            min: 1,
            value: 0
        }));
        assert!(errors.contains(&ValidationError::InvalidAddress("not-an-address".into())));
    }

    #[test]
    fn test_decreasing_backoff_is_valid() {
        let mut config = ResilienceConfig::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(validate_config(&config).is_ok());

        config.retry.backoff_multiplier = -1.0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "retry.backoff_multiplier must be a finite, non-negative number (got -1)");
    }
}
