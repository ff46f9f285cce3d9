//! Independently retried tasks under a concurrency ceiling.
//!
//! # Data Flow
//! ```text
//! tasks[i]
//!     → wrapped as || execute_with_retry_counted(tasks[i], policy)
//!     → ConcurrencyPool (at most `limit` in flight)
//!     → PooledResult { index: i, outcome, attempts }
//! ```
//!
//! # Design Decisions
//! - A task's failure only ever lands in its own slot
//! - `attempts` counts real invocations, including the one that succeeded
//! - Only a structural problem (bad limit, bad policy) fails the whole call

use std::fmt;
use std::future::Future;

use crate::observability::metrics;
use crate::resilience::pool::ConcurrencyPool;
use crate::resilience::retries::{execute_with_retry_counted, RetryPolicy};
use crate::resilience::types::ConfigurationError;

/// Result of one task in a pooled batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledResult<T, E> {
    /// Position of the task in the submitted batch.
    pub index: usize,
    /// Final value, or the error from the last attempt.
    pub outcome: Result<T, E>,
    /// Number of times the task was invoked.
    pub attempts: u32,
}

impl<T, E> PooledResult<T, E> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&E> {
        self.outcome.as_ref().err()
    }
}

/// Runs batches of tasks, each under its own retry loop.
#[derive(Debug, Clone)]
pub struct PooledRetryRunner<E> {
    policy: RetryPolicy<E>,
    pool: ConcurrencyPool,
}

impl<E: fmt::Display> PooledRetryRunner<E> {
    pub fn new(policy: RetryPolicy<E>, concurrency_limit: usize) -> Result<Self, ConfigurationError> {
        Ok(Self {
            policy,
            pool: ConcurrencyPool::new(concurrency_limit)?,
        })
    }

    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }

    pub fn concurrency_limit(&self) -> usize {
        self.pool.limit()
    }

    /// Run every task; the returned results are aligned with `tasks`.
    pub async fn run<T, F, Fut>(&self, tasks: Vec<F>) -> Vec<PooledResult<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let policy = &self.policy;
        let wrapped: Vec<_> = tasks
            .into_iter()
            .enumerate()
            .map(move |(index, task)| {
                move || async move {
                    let outcome = execute_with_retry_counted(task, policy).await;
                    PooledResult {
                        index,
                        outcome: outcome.result,
                        attempts: outcome.attempts,
                    }
                }
            })
            .collect();

        let results = self.pool.run(wrapped).await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        for result in &results {
            metrics::record_pool_task(result.is_success());
        }
        if failed > 0 {
            tracing::warn!(tasks = results.len(), failed, "Pooled batch finished with failures");
        } else {
            tracing::debug!(tasks = results.len(), "Pooled batch finished");
        }

        results
    }
}

/// Run `tasks` with bounded concurrency, retrying each one under `policy`.
pub async fn run_pooled_with_retry<T, E, F, Fut>(
    tasks: Vec<F>,
    policy: &RetryPolicy<E>,
    concurrency_limit: usize,
) -> Result<Vec<PooledResult<T, E>>, ConfigurationError>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let runner = PooledRetryRunner::new(policy.clone(), concurrency_limit)?;
    Ok(runner.run(tasks).await)
}
