//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl-C / explicit trigger → watch channel flips to `true`
//!
//! Context (context.rs):
//!     Shutdown::context() → Context (+ optional deadline)
//!     → passed by reference through services, repositories, retries
//!     → Context::cancelled() resolves on shutdown or deadline
//! ```
//!
//! # Design Decisions
//! - One shutdown signal per process, fanned out through cheap `Context` clones
//! - Deadlines are absolute (`tokio::time::Instant`) so nested timeouts only shrink
//! - The only await point that observes cancellation is the retry backoff wait

pub mod context;
pub mod shutdown;

pub use context::{CancelReason, Cancelled, Context};
pub use shutdown::Shutdown;
