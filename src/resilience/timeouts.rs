//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race an operation against a deadline
//! - Report a distinct `TimeoutError` when the deadline wins
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The operation is polled before the timer, so a tie goes to the operation
//! - On timeout the operation's future is dropped; work it already handed to
//!   other tasks (spawned futures, OS threads, a remote node) keeps running

use std::future::Future;
use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::types::{ResilienceError, TimeoutError};

/// Await `operation`, giving up after `duration`.
pub async fn with_timeout<T, E, Fut>(operation: Fut, duration: Duration) -> Result<T, ResilienceError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(duration, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ResilienceError::Operation(e)),
        Err(_) => {
            tracing::warn!(timeout_ms = duration.as_millis() as u64, "Operation deadline exceeded");
            metrics::record_timeout();
            Err(TimeoutError { after: duration }.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_timer_wins() {
        let start = Instant::now();
        let result = with_timeout(
            async {
                sleep(Duration::from_millis(500)).await;
                Ok::<_, String>("late")
            },
            Duration::from_millis(100),
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "operation timed out after 100ms");
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_wins() {
        let result = with_timeout(
            async {
                sleep(Duration::from_millis(20)).await;
                Ok::<_, String>(42)
            },
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_is_not_a_timeout() {
        let result = with_timeout(async { Err::<(), _>("refused".to_string()) }, Duration::from_millis(100)).await;
        assert_eq!(result.unwrap_err().into_operation_error().as_deref(), Some("refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tie_favours_operation() {
        let result = with_timeout(
            async {
                sleep(Duration::from_millis(100)).await;
                Ok::<_, String>("on time")
            },
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(result.unwrap(), "on time");
    }
}
