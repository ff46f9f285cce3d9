//! Condition polling under a deadline.
//!
//! Used for confirmation-style waits: submit something remotely, then poll
//! its status until it reaches the wanted state or the deadline passes.

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::resilience::timeouts::with_timeout;
use crate::resilience::types::{ConfigurationError, ResilienceError};

/// Poll `operation` every `every` until `is_done` accepts its value.
///
/// The first poll happens immediately. An operation error ends the loop and
/// is returned as [`ResilienceError::Operation`]; if `deadline` passes first
/// the result is [`ResilienceError::Timeout`].
pub async fn poll_until<T, E, F, Fut, P>(
    mut operation: F,
    mut is_done: P,
    every: Duration,
    deadline: Duration,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T) -> bool,
{
    if every.is_zero() {
        return Err(ConfigurationError::ZeroDuration("poll interval").into());
    }

    with_timeout(
        async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut polls: u32 = 0;

            loop {
                ticker.tick().await;
                polls += 1;

                let value = match operation().await {
                    Ok(value) => value,
                    Err(e) => return Err(e),
                };
                if is_done(&value) {
                    tracing::debug!(polls, "Polled condition satisfied");
                    return Ok(value);
                }
                tracing::trace!(polls, "Polled condition not yet satisfied");
            }
        },
        deadline,
    )
    .await
}
