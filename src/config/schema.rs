//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite connection settings.
    pub database: DatabaseConfig,

    /// Breaker guarding every repository call.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry policy for transient database errors.
    pub retries: RetryConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Snowflake node selection.
    pub id_generator: IdGeneratorConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (e.g., "sqlite://resilient-store.db").
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// How long SQLite waits on a locked database before returning BUSY.
    pub busy_timeout_ms: u64,

    /// Create the database file when it does not exist.
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://resilient-store.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
            create_if_missing: true,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Breaker name for logs and metrics.
    pub name: String,

    /// Trial requests allowed while half-open (0 = 1).
    pub max_requests: u32,

    /// Closed-state count reset period in seconds (0 = never).
    pub interval_secs: u64,

    /// Open-state duration in seconds before probing (0 = 60).
    pub timeout_secs: u64,

    /// Trip once consecutive failures exceed this number.
    pub consecutive_failures: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "sqlite".to_string(),
            max_requests: 1,
            interval_secs: 0,
            timeout_secs: 60,
            consecutive_failures: 5,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format.
    pub log_format: LogFormat,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Id generator configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdGeneratorConfig {
    /// Snowflake node id (0..=1023). Derived from `HOSTNAME` when absent.
    pub node_id: Option<i64>,
}
