//! Retry logic.
//!
//! # Responsibilities
//! - Hold the retry policy (attempt budget, backoff curve, retry predicate)
//! - Execute an operation repeatedly with exponential backoff + jitter
//! - Notify the caller before each backoff through `on_retry`
//!
//! # Design Decisions
//! - Attempts are strictly sequential; the task yields while backing off
//! - No delay after the final attempt or after a success
//! - The last error is returned unmodified so callers see the real cause
//! - A non-retryable error stops the loop on the attempt that produced it

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::{compute_delay, Backoff};
use crate::resilience::types::ConfigurationError;

/// Predicate deciding whether an error is worth another attempt.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Hook invoked with the error and the upcoming attempt number (1-based).
pub type RetryHook<E> = Arc<dyn Fn(&E, u32) + Send + Sync>;

/// Immutable retry policy.
pub struct RetryPolicy<E> {
    max_attempts: u32,
    backoff: Backoff,
    is_retryable: RetryPredicate<E>,
    on_retry: Option<RetryHook<E>>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            is_retryable: self.is_retryable.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl<E: 'static> RetryPolicy<E> {
    /// Start building a policy from the defaults.
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Build a policy from file configuration. Every error is retryable.
    pub fn from_config(config: &RetryConfig) -> Result<Self, ConfigurationError> {
        Self::builder()
            .max_attempts(config.max_attempts)
            .initial_delay(Duration::from_millis(config.initial_delay_ms))
            .max_delay(Duration::from_millis(config.max_delay_ms))
            .backoff_multiplier(config.backoff_multiplier)
            .jitter_factor(config.jitter_factor)
            .build()
    }
}

impl<E> RetryPolicy<E> {
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Delay to wait after the zero-based `attempt` failed.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        compute_delay(attempt, &self.backoff)
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        (self.is_retryable)(error)
    }

    /// Run `operation` under this policy.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        execute_with_retry(operation, self).await
    }
}

impl<E: 'static> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
            is_retryable: Arc::new(|_: &E| true),
            on_retry: None,
        }
    }
}

/// Builder for [`RetryPolicy`]; `build` validates the result.
pub struct RetryPolicyBuilder<E> {
    policy: RetryPolicy<E>,
}

impl<E: 'static> RetryPolicyBuilder<E> {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.backoff.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.backoff.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.policy.backoff.multiplier = multiplier;
        self
    }

    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.policy.backoff.jitter_factor = factor;
        self
    }

    /// Only retry errors accepted by `predicate`.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.policy.is_retryable = Arc::new(predicate);
        self
    }

    /// Called synchronously before each backoff delay.
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E, u32) + Send + Sync + 'static,
    {
        self.policy.on_retry = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<RetryPolicy<E>, ConfigurationError> {
        let policy = self.policy;
        if policy.max_attempts < 1 {
            return Err(ConfigurationError::InvalidMaxAttempts(policy.max_attempts));
        }
        let multiplier = policy.backoff.multiplier;
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(ConfigurationError::InvalidMultiplier(multiplier));
        }
        let jitter = policy.backoff.jitter_factor;
        if !(0.0..=1.0).contains(&jitter) {
            return Err(ConfigurationError::InvalidJitter(jitter));
        }
        Ok(policy)
    }
}

impl<E: 'static> Default for RetryPolicyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a retried call together with the number of invocations made.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget is spent. The final error is returned as-is.
pub async fn execute_with_retry<T, E, F, Fut>(operation: F, policy: &RetryPolicy<E>) -> Result<T, E>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    execute_with_retry_counted(operation, policy).await.result
}

/// Like [`execute_with_retry`], but also reports how many times the
/// operation was invoked.
pub async fn execute_with_retry_counted<T, E, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy<E>,
) -> RetryOutcome<T, E>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                metrics::record_attempt(true);
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return RetryOutcome { result: Ok(value), attempts: attempt + 1 };
            }
            Err(e) => e,
        };
        metrics::record_attempt(false);

        if attempt + 1 >= policy.max_attempts {
            if policy.max_attempts > 1 {
                tracing::warn!(
                    attempts = attempt + 1,
                    error = %error,
                    "Retry attempts exhausted"
                );
                metrics::record_retries_exhausted();
            }
            return RetryOutcome { result: Err(error), attempts: attempt + 1 };
        }

        if !policy.is_retryable(&error) {
            tracing::debug!(
                attempt = attempt + 1,
                error = %error,
                "Error is not retryable, giving up"
            );
            return RetryOutcome { result: Err(error), attempts: attempt + 1 };
        }

        if let Some(hook) = &policy.on_retry {
            hook(&error, attempt + 1);
        }

        let delay = policy.compute_delay(attempt);
        tracing::debug!(
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Operation failed, retrying after backoff"
        );

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
