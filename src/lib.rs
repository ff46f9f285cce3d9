//! Resilience execution core for the savings-circle platform.
//!
//! Primitives for running unreliable remote operations (RPC calls, ledger
//! transaction submission and confirmation polling) under retry, circuit
//! breaking, bounded parallelism and deadlines.

pub mod config;
pub mod observability;
pub mod resilience;

pub use config::schema::ResilienceConfig;
pub use resilience::{
    execute_with_retry, poll_until, run_pooled_with_retry, run_with_concurrency, with_timeout,
    BreakerRegistry, CircuitBreaker, CircuitConfig, CircuitState, ConcurrencyPool, PooledResult,
    PooledRetryRunner, ResilienceError, RetryPolicy,
};
