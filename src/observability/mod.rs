//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resilience primitives produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log output (stdout via tracing-subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (breaker name, attempt, delay)
//! - Metrics go through the `metrics` facade; without an installed recorder
//!   every update is a no-op
//! - Installing subscribers/recorders is left to the binary

pub mod logging;
pub mod metrics;
