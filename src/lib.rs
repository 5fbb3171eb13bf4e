//! Resilient transactional store.
//!
//! Idempotent writes over SQLite, with every statement guarded by a circuit
//! breaker around a bounded retry, and each logical request bound to one
//! unit of work.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod idempotency;
pub mod idgen;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod repository;
pub mod resilience;
pub mod service;

pub use app::App;
pub use config::AppConfig;
pub use error::{Error, ErrorKind, Result};
pub use lifecycle::{Context, Shutdown};
