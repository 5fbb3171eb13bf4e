//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Repository storage call:
//!     → circuit_breaker.rs (reject fast while the downstream is considered down)
//!     → retries.rs (re-run transient failures with backoff.rs delays)
//!     → the physical I/O call
//! ```
//!
//! # Design Decisions
//! - One breaker per protected downstream, shared by reference (`Arc`)
//! - The breaker sees one outcome per retried call, not one per attempt
//! - Retries consult a predicate; errors the predicate rejects return at once
//! - Breaker rejections are a distinct error and are never retried internally

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;

pub use circuit_breaker::{BreakerRejected, CircuitBreaker, Counts, Rejection, Settings, State};
pub use retries::Retry;
