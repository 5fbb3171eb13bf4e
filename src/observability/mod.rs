//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience, idempotency, services produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters through the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Library code only emits events; the binary installs subscribers and exporters
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
