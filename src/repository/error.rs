//! Storage error taxonomy and retry classification.

use thiserror::Error;

use crate::lifecycle::Cancelled;
use crate::resilience::BreakerRejected;

/// SQLite result codes that clear up on their own.
/// BUSY, LOCKED, LOCKED_SHAREDCACHE.
///
/// BUSY_SNAPSHOT (517) is absent: the transaction's read snapshot is stale and
/// no statement inside that transaction can succeed.
const TRANSIENT_SQLITE_CODES: [&str; 3] = ["5", "6", "261"];

/// SQLITE_CONSTRAINT_PRIMARYKEY and SQLITE_CONSTRAINT_UNIQUE.
const UNIQUE_SQLITE_CODES: [&str; 2] = ["1555", "2067"];

/// Errors produced by repository calls and unit-of-work finalization.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Driver or database failure, passed through unchanged.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The breaker refused the call; the database was not touched.
    #[error(transparent)]
    CircuitOpen(#[from] BreakerRejected),

    /// Cancelled while waiting between retry attempts.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// The transaction was already committed or rolled back.
    #[error("transaction is already finished")]
    TransactionClosed,

    /// A required row is absent.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A stored column could not be mapped to its domain type.
    #[error("invalid value in column {column}: {message}")]
    Decode {
        column: &'static str,
        message: String,
    },
}

impl StoreError {
    /// Primary key or unique index violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => {
                db.is_unique_violation()
                    || db
                        .code()
                        .is_some_and(|code| UNIQUE_SQLITE_CODES.contains(&code.as_ref()))
            }
            _ => false,
        }
    }

    /// Whether retrying the same statement may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(err) => is_transient_sqlx(err),
            _ => false,
        }
    }
}

/// Busy/locked database, I/O failures and pool exhaustion are transient.
/// Constraint violations, decode errors and everything else are permanent.
pub fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| TRANSIENT_SQLITE_CODES.contains(&code.as_ref())),
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::CancelReason;
    use crate::resilience::Rejection;
    use std::borrow::Cow;

    #[derive(Debug)]
    struct CodedError(&'static str);

    impl std::fmt::Display for CodedError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "sqlite error {}", self.0)
        }
    }

    impl std::error::Error for CodedError {}

    impl sqlx::error::DatabaseError for CodedError {
        fn message(&self) -> &str {
            "sqlite error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn coded(code: &'static str) -> StoreError {
        StoreError::Database(sqlx::Error::Database(Box::new(CodedError(code))))
    }

    #[test]
    fn test_busy_and_locked_are_transient() {
        for code in ["5", "6", "261"] {
            assert!(coded(code).is_transient(), "code {code}");
        }
    }

    #[test]
    fn test_stale_snapshot_is_not_retried() {
        assert!(!coded("517").is_transient());
    }

    #[test]
    fn test_constraint_codes_are_unique_violations() {
        assert!(coded("1555").is_unique_violation());
        assert!(coded("2067").is_unique_violation());
        assert!(!coded("787").is_unique_violation());
        assert!(!coded("2067").is_transient());
    }

    #[test]
    fn test_io_and_pool_timeouts_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(StoreError::Database(sqlx::Error::Io(io)).is_transient());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!StoreError::Database(sqlx::Error::PoolClosed).is_transient());
        assert!(!StoreError::TransactionClosed.is_transient());
        assert!(!StoreError::Cancelled(Cancelled::new(CancelReason::Shutdown)).is_transient());
        assert!(!StoreError::CircuitOpen(BreakerRejected {
            breaker: "db".into(),
            reason: Rejection::Open,
        })
        .is_transient());
    }

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert!(!StoreError::TransactionClosed.is_unique_violation());
        assert!(!StoreError::NotFound { entity: "user", id: 1 }.is_unique_violation());
    }
}
