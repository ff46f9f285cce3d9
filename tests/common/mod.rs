//! Shared utilities for integration testing.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("node busy")]
    Busy,

    #[error("invalid payload")]
    Invalid,
}

impl RemoteError {
    #[allow(dead_code)]
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Busy)
    }
}

/// A remote operation that fails with `error` for its first `failures` calls.
#[derive(Clone)]
pub struct FlakyOperation {
    calls: Arc<AtomicU32>,
    failures: u32,
    error: RemoteError,
}

#[allow(dead_code)]
impl FlakyOperation {
    pub fn new(failures: u32, error: RemoteError) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            error,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// One invocation; the value is the 1-based call number.
    pub fn call(&self) -> impl Future<Output = Result<u32, RemoteError>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = if n <= self.failures {
            Err(self.error.clone())
        } else {
            Ok(n)
        };
        async move { outcome }
    }
}

/// Tracks how many operations are in flight at once.
#[derive(Clone, Default)]
pub struct ConcurrencyProbe {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Hold a slot for `hold`, then return `value`.
    pub async fn track<T>(&self, hold: Duration, value: T) -> T {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        value
    }
}
