//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Single call:
//!     → retries.rs (repeat per policy, backoff.rs between attempts)
//!     → circuit_breaker.rs (fail fast while a dependency is down)
//!     → timeouts.rs (optional deadline around any of the above)
//!
//! Batch:
//!     → pooled.rs (wrap each task in its own retry loop)
//!     → pool.rs (at most `limit` tasks in flight)
//!     → one PooledResult per task, in input order
//! ```
//!
//! # Design Decisions
//! - Every primitive is an explicit value; there are no process-wide instances
//! - Operations are `FnMut() -> Future` so they can be invoked repeatedly
//! - Retries return the operation's own error; breaker and deadline failures
//!   have their own error types
//! - State is in memory only and lives as long as the owning value

pub mod backoff;
pub mod circuit_breaker;
pub mod polling;
pub mod pool;
pub mod pooled;
pub mod registry;
pub mod retries;
pub mod timeouts;
pub mod types;

pub use backoff::{compute_delay, Backoff};
pub use circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitSnapshot, CircuitState, CircuitTransition};
pub use polling::poll_until;
pub use pool::{run_with_concurrency, ConcurrencyPool};
pub use pooled::{run_pooled_with_retry, PooledResult, PooledRetryRunner};
pub use registry::BreakerRegistry;
pub use retries::{execute_with_retry, execute_with_retry_counted, RetryOutcome, RetryPolicy, RetryPolicyBuilder};
pub use timeouts::with_timeout;
pub use types::{CircuitOpenError, ConfigurationError, ResilienceError, ResilienceResult, TimeoutError};
