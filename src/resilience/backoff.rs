//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Shape of the delay curve between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay, jitter included.
    pub max_delay: Duration,
    /// Growth factor per attempt. Values below 1 shrink the delay.
    pub multiplier: f64,
    /// Fraction of the base delay used as the jitter amplitude.
    pub jitter_factor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Calculate the delay before the retry that follows `attempt` (zero-based).
///
/// The result never exceeds `backoff.max_delay`.
pub fn compute_delay(attempt: u32, backoff: &Backoff) -> Duration {
    let sample = if backoff.jitter_factor > 0.0 {
        rand::thread_rng().gen_range(-1.0..=1.0)
    } else {
        0.0
    };
    delay_with_sample(attempt, backoff, sample)
}

/// Deterministic core of [`compute_delay`]; `sample` is the jitter draw in `[-1, 1]`.
fn delay_with_sample(attempt: u32, backoff: &Backoff, sample: f64) -> Duration {
    let max_ms = backoff.max_delay.as_millis() as f64;
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw = backoff.initial_delay.as_millis() as f64 * backoff.multiplier.powi(exponent);

    // 0 * inf shows up as NaN when the initial delay is zero
    let base = if raw.is_nan() { 0.0 } else { raw.min(max_ms) };

    let jittered = base + sample * base * backoff.jitter_factor;
    let clamped = if jittered.is_nan() { base } else { jittered.clamp(0.0, max_ms) };

    Duration::from_millis(clamped.round() as u64)
}
