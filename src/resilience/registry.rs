//! Named circuit breakers, one per dependency.
//!
//! # Responsibilities
//! - Create breakers lazily on first use with a shared configuration
//! - Hand out the same breaker for the same dependency name
//! - Expose snapshots of every breaker for dashboards
//!
//! # Design Decisions
//! - Per-dependency breakers (not global)
//! - The registry is an ordinary value; callers own and share it via Arc

use dashmap::DashMap;
use std::sync::Arc;

use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitSnapshot};
use crate::resilience::types::ConfigurationError;

/// A set of breakers keyed by dependency name.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: CircuitConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            breakers: DashMap::new(),
        })
    }

    /// The breaker for `name`, created Closed if it does not exist yet.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }
        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(breaker = %name, "Registering circuit breaker");
            Arc::new(CircuitBreaker::with_validated(name.to_string(), self.config))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Snapshots of every registered breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|r| r.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;
    use std::time::Duration;

    fn registry() -> BreakerRegistry {
        BreakerRegistry::new(CircuitConfig {
            failure_threshold: 1,
            open_duration: Duration::from_secs(10),
            success_threshold: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_same_name_same_breaker() {
        let registry = registry();
        let a = registry.get_or_create("rpc-primary");
        let b = registry.get_or_create("rpc-primary");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("rpc-failover").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_breakers_are_independent() {
        let registry = registry();
        let primary = registry.get_or_create("rpc-primary");
        let failover = registry.get_or_create("rpc-failover");

        let _ = primary.execute(|| async { Err::<(), _>("down") }).await;

        let snapshots = registry.snapshots();
        assert_eq!(snapshots[0].name, "rpc-failover");
        assert_eq!(snapshots[0].state, CircuitState::Closed);
        assert_eq!(snapshots[1].name, "rpc-primary");
        assert_eq!(snapshots[1].state, CircuitState::Open);

        assert!(failover.execute(|| async { Ok::<_, &str>(()) }).await.is_ok());

        registry.reset_all();
        assert_eq!(primary.state(), CircuitState::Closed);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let err = BreakerRegistry::new(CircuitConfig {
            success_threshold: 0,
            ..CircuitConfig::default()
        })
        .unwrap_err();
        assert_eq!(err, ConfigurationError::ZeroThreshold("success_threshold"));
    }
}
