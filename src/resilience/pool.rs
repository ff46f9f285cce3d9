//! Bounded-parallelism scheduler.
//!
//! # Responsibilities
//! - Run a batch of operations with at most `limit` in flight
//! - Admit queued operations in input order as slots free up
//! - Return outputs aligned with the input positions
//!
//! # Design Decisions
//! - Cooperative: in-flight operations are polled together on the caller's
//!   task through `FuturesUnordered`, no spawning
//! - Outputs are plain values, so a failed operation (an `Err` output) never
//!   aborts the rest of the batch
//! - An invalid limit is rejected before any operation starts

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

use crate::resilience::types::ConfigurationError;

/// An operation paired with its position in the submitted batch.
struct PoolTask<F> {
    index: usize,
    operation: F,
}

impl<F> PoolTask<F> {
    async fn run<T, Fut>(self) -> (usize, T)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let output = (self.operation)().await;
        (self.index, output)
    }
}

/// Runs batches of operations with a concurrency ceiling.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyPool {
    limit: usize,
}

impl ConcurrencyPool {
    pub fn new(limit: usize) -> Result<Self, ConfigurationError> {
        if limit < 1 {
            return Err(ConfigurationError::InvalidConcurrencyLimit(limit));
        }
        Ok(Self { limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every task, returning outputs in the order the tasks were given.
    pub async fn run<T, F, Fut>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let total = tasks.len();
        let mut queue = tasks
            .into_iter()
            .enumerate()
            .map(|(index, operation)| PoolTask { index, operation });

        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
        let mut in_flight = FuturesUnordered::new();

        for task in queue.by_ref().take(self.limit) {
            in_flight.push(task.run());
        }
        tracing::debug!(tasks = total, limit = self.limit, "Pool started");

        while let Some((index, output)) = in_flight.next().await {
            slots[index] = Some(output);
            if let Some(task) = queue.next() {
                in_flight.push(task.run());
            }
        }

        tracing::debug!(tasks = total, "Pool drained");
        slots.into_iter().flatten().collect()
    }
}

/// Run `tasks` with at most `limit` in flight; outputs are index-aligned.
pub async fn run_with_concurrency<T, F, Fut>(tasks: Vec<F>, limit: usize) -> Result<Vec<T>, ConfigurationError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let pool = ConcurrencyPool::new(limit)?;
    Ok(pool.run(tasks).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_rejects_zero_limit() {
        let started = AtomicUsize::new(0);
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let started = &started;
                move || async move {
                    started.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();

        let err = run_with_concurrency(tasks, 0).await.unwrap_err();
        assert_eq!(err, ConfigurationError::InvalidConcurrencyLimit(0));
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_respects_limit_and_preserves_order() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let started = Mutex::new(Vec::new());

        let tasks: Vec<_> = (0..5u64)
            .map(|i| {
                let (active, peak, started) = (&active, &peak, &started);
                move || async move {
                    started.lock().unwrap().push(i);
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(50 - i * 10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    i * 10
                }
            })
            .collect();

        let results = run_with_concurrency(tasks, 2).await.unwrap();

        assert_eq!(results, vec![0, 10, 20, 30, 40]);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort_batch() {
        let pool = ConcurrencyPool::new(3).unwrap();
        let tasks: Vec<_> = (0..4)
            .map(|i| move || async move { if i % 2 == 0 { Ok(i) } else { Err(format!("task {i} failed")) } })
            .collect();

        let results = pool.run(tasks).await;
        assert_eq!(
            results,
            vec![Ok(0), Err("task 1 failed".to_string()), Ok(2), Err("task 3 failed".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let tasks: Vec<fn() -> std::future::Ready<u8>> = Vec::new();
        let results = run_with_concurrency(tasks, 4).await.unwrap();
        assert!(results.is_empty());
    }
}
