//! Crate-level error type.
//!
//! # Design Decisions
//! - Storage errors pass through untouched inside `Error::Store`
//! - `kind()` is the single place callers map errors to responses

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::idgen::IdGenError;
use crate::repository::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The operation's result could not be serialized for the idempotency record.
    #[error("failed to encode idempotent response: {0}")]
    Encode(#[source] serde_json::Error),

    /// A stored idempotency record does not deserialize into the expected type.
    #[error("idempotency record {id} is corrupt: {source}")]
    CorruptRecord {
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("id generator error: {0}")]
    IdGenerator(#[from] IdGenError),
}

/// Coarse classification used at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Unavailable,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Store(err) if err.is_unique_violation() => ErrorKind::AlreadyExists,
            Error::Store(StoreError::CircuitOpen(_)) => ErrorKind::Unavailable,
            Error::Store(StoreError::Cancelled(_)) => ErrorKind::Cancelled,
            Error::Store(err) if err.is_transient() => ErrorKind::Unavailable,
            _ => ErrorKind::Internal,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}
