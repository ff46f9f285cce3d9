//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through, failures are counted
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: trial calls probe whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: open_duration elapsed since the last failure (checked on access)
//! Half-Open → Closed: successes >= success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency, constructed explicitly (see `registry.rs`)
//! - Fail fast in Open state without touching counters
//! - No background timer; the Open → Half-Open check runs on every access
//! - Counters reset on every state transition
//! - State lives behind a std mutex that is never held across an await

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::schema::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::types::{CircuitOpenError, ConfigurationError, ResilienceError};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitConfig {
    /// Consecutive failures in Closed state that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a trial call.
    pub open_duration: Duration,
    /// Successful trial calls that close the circuit again.
    pub success_threshold: u32,
}

impl CircuitConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.failure_threshold == 0 {
            return Err(ConfigurationError::ZeroThreshold("failure_threshold"));
        }
        if self.success_threshold == 0 {
            return Err(ConfigurationError::ZeroThreshold("success_threshold"));
        }
        if self.open_duration.is_zero() {
            return Err(ConfigurationError::ZeroDuration("open_duration"));
        }
        Ok(())
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_millis(30_000),
            success_threshold: 2,
        }
    }
}

impl From<&BreakerConfig> for CircuitConfig {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            open_duration: Duration::from_millis(config.open_duration_ms),
            success_threshold: config.success_threshold,
        }
    }
}

/// A state change, delivered to transition listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitTransition {
    pub breaker: String,
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Point-in-time view of a breaker for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
}

type TransitionListener = Arc<dyn Fn(&CircuitTransition) + Send + Sync>;

#[derive(Debug)]
struct CircuitMemory {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
}

/// Stateful guard around calls to one dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitConfig,
    memory: Mutex<CircuitMemory>,
    listeners: RwLock<Vec<TransitionListener>>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("memory", &*self.lock())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self::with_validated(name.into(), config))
    }

    pub(crate) fn with_validated(name: String, config: CircuitConfig) -> Self {
        metrics::record_circuit_state(&name, CircuitState::Closed);
        Self {
            name,
            config,
            memory: Mutex::new(CircuitMemory {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Register a callback invoked after every state transition.
    pub fn on_transition<F>(&self, listener: F)
    where
        F: Fn(&CircuitTransition) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(listener));
    }

    /// Run `operation` through the breaker.
    ///
    /// In the Open state the operation is not invoked and
    /// [`ResilienceError::CircuitOpen`] is returned.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(ResilienceError::Operation(e))
            }
        }
    }

    /// Current state, after applying the lazy Open → Half-Open check.
    pub fn state(&self) -> CircuitState {
        self.snapshot().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let (snapshot, transition) = {
            let mut memory = self.lock();
            let transition = self.refresh(&mut memory, Instant::now());
            let snapshot = CircuitSnapshot {
                name: self.name.clone(),
                state: memory.state,
                failure_count: memory.failure_count,
                success_count: memory.success_count,
            };
            (snapshot, transition)
        };
        self.notify(transition);
        snapshot
    }

    /// Force the breaker back to Closed with cleared counters.
    pub fn reset(&self) {
        let transition = {
            let mut memory = self.lock();
            let transition = if memory.state != CircuitState::Closed {
                Some(self.transition(&mut memory, CircuitState::Closed, Instant::now()))
            } else {
                None
            };
            memory.failure_count = 0;
            memory.success_count = 0;
            memory.last_failure_at = None;
            transition
        };
        self.notify(transition);
    }

    fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let now = Instant::now();
        let (outcome, transition) = {
            let mut memory = self.lock();
            let transition = self.refresh(&mut memory, now);
            let outcome = if memory.state == CircuitState::Open {
                let elapsed = memory
                    .last_failure_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or_default();
                Err(CircuitOpenError {
                    breaker: self.name.clone(),
                    retry_in: self.config.open_duration.saturating_sub(elapsed),
                })
            } else {
                Ok(())
            };
            (outcome, transition)
        };
        self.notify(transition);

        if let Err(e) = &outcome {
            tracing::debug!(breaker = %self.name, retry_in_ms = e.retry_in.as_millis() as u64, "Call rejected, circuit open");
            metrics::record_circuit_rejection(&self.name);
        }
        outcome
    }

    fn record_success(&self) {
        let transition = {
            let mut memory = self.lock();
            match memory.state {
                CircuitState::Closed => {
                    memory.failure_count = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    memory.success_count += 1;
                    if memory.success_count >= self.config.success_threshold {
                        Some(self.transition(&mut memory, CircuitState::Closed, Instant::now()))
                    } else {
                        None
                    }
                }
                // Admitted before another call opened the circuit.
                CircuitState::Open => None,
            }
        };
        self.notify(transition);
    }

    fn record_failure(&self) {
        let now = Instant::now();
        let transition = {
            let mut memory = self.lock();
            match memory.state {
                CircuitState::Closed => {
                    memory.failure_count += 1;
                    memory.last_failure_at = Some(now);
                    if memory.failure_count >= self.config.failure_threshold {
                        Some(self.transition(&mut memory, CircuitState::Open, now))
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => Some(self.transition(&mut memory, CircuitState::Open, now)),
                CircuitState::Open => None,
            }
        };
        self.notify(transition);
    }

    /// Open → Half-Open once the open duration has elapsed.
    fn refresh(&self, memory: &mut CircuitMemory, now: Instant) -> Option<CircuitTransition> {
        if memory.state != CircuitState::Open {
            return None;
        }
        let ready = match memory.last_failure_at {
            Some(at) => now.saturating_duration_since(at) >= self.config.open_duration,
            None => true,
        };
        if ready {
            Some(self.transition(memory, CircuitState::HalfOpen, now))
        } else {
            None
        }
    }

    fn transition(&self, memory: &mut CircuitMemory, to: CircuitState, now: Instant) -> CircuitTransition {
        let from = memory.state;
        memory.state = to;
        memory.failure_count = 0;
        memory.success_count = 0;
        if to == CircuitState::Open {
            memory.last_failure_at = Some(now);
        }
        metrics::record_circuit_state(&self.name, to);

        CircuitTransition {
            breaker: self.name.clone(),
            from,
            to,
        }
    }

    /// Log and fan out a transition. Must be called without the memory lock held.
    fn notify(&self, transition: Option<CircuitTransition>) {
        let Some(transition) = transition else {
            return;
        };

        if transition.to == CircuitState::Open {
            tracing::warn!(breaker = %self.name, from = %transition.from, "Circuit opened");
        } else {
            tracing::info!(breaker = %self.name, from = %transition.from, to = %transition.to, "Circuit state changed");
        }

        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner()).clone();
        for listener in listeners {
            listener(&transition);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitMemory> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker(failures: u32, open_ms: u64, successes: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitConfig {
                failure_threshold: failures,
                open_duration: Duration::from_millis(open_ms),
                success_threshold: successes,
            },
        )
        .unwrap()
    }

    async fn fail(cb: &CircuitBreaker) -> ResilienceError<&'static str> {
        cb.execute(|| async { Err::<(), _>("down") }).await.unwrap_err()
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<u32, ResilienceError<&'static str>> {
        cb.execute(|| async { Ok(1) }).await
    }

    #[test]
    fn test_config_validation() {
        let mut config = CircuitConfig::default();
        assert!(config.validate().is_ok());

        config.failure_threshold = 0;
        assert_eq!(
            CircuitBreaker::new("x", config).unwrap_err(),
            ConfigurationError::ZeroThreshold("failure_threshold")
        );

        let config = CircuitConfig { open_duration: Duration::ZERO, ..CircuitConfig::default() };
        assert_eq!(config.validate(), Err(ConfigurationError::ZeroDuration("open_duration")));
    }

    #[test]
    fn test_from_file_config() {
        let config = CircuitConfig::from(&BreakerConfig::default());
        assert_eq!(config, CircuitConfig::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_rejects_without_invoking() {
        let cb = breaker(3, 1000, 1);
        for _ in 0..2 {
            assert!(matches!(fail(&cb).await, ResilienceError::Operation("down")));
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        let calls = AtomicU32::new(0);
        let err = cb
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, &str>(()) }
            })
            .await
            .unwrap_err();

        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.success_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker(2, 1000, 1);
        fail(&cb).await;
        succeed(&cb).await.unwrap();
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_open_duration() {
        let cb = breaker(1, 1000, 2);
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().success_count, 1);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().success_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_immediately() {
        let cb = breaker(1, 500, 3);
        fail(&cb).await;
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb).await.unwrap();
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        let err = succeed(&cb).await.unwrap_err();
        match err {
            ResilienceError::CircuitOpen(e) => assert_eq!(e.retry_in, Duration::from_millis(500)),
            other => panic!("expected open circuit, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_listeners_and_reset() {
        let cb = breaker(1, 1000, 1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        cb.on_transition(move |t| sink.lock().unwrap().push((t.from, t.to)));

        fail(&cb).await;
        tokio::time::advance(Duration::from_millis(1000)).await;
        succeed(&cb).await.unwrap();
        fail(&cb).await;
        cb.reset();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::Closed),
            ]
        );
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_snapshot_serializes() {
        let cb = breaker(1, 1000, 1);
        let json = serde_json::to_value(cb.snapshot()).unwrap();
        assert_eq!(json["state"], "closed");
        assert_eq!(json["name"], "test");
    }
}
