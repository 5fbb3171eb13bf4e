//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool size > 0, delays ordered, node id in range)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::AppConfig;
use crate::idgen::MAX_NODE_ID;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("database.url must not be empty")]
    EmptyDatabaseUrl,
    #[error("database.max_connections must be greater than zero")]
    ZeroPoolSize,
    #[error("circuit_breaker.name must not be empty")]
    EmptyBreakerName,
    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    DelayOrder { base: u64, max: u64 },
    #[error("id_generator.node_id {0} is outside 0..={max}", max = MAX_NODE_ID)]
    NodeIdOutOfRange(i64),
    #[error("observability.log_level '{0}' is not a known level")]
    UnknownLogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.database.url.trim().is_empty() {
        errors.push(ValidationError::EmptyDatabaseUrl);
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::ZeroPoolSize);
    }
    if config.circuit_breaker.name.trim().is_empty() {
        errors.push(ValidationError::EmptyBreakerName);
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::DelayOrder {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }
    if let Some(node_id) = config.id_generator.node_id {
        if !(0..=MAX_NODE_ID).contains(&node_id) {
            errors.push(ValidationError::NodeIdOutOfRange(node_id));
        }
    }
    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
