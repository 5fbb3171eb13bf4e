//! Database bootstrap: pool, schema, breaker and retry policy.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::config::{AppConfig, CircuitBreakerConfig, DatabaseConfig, RetryConfig};
use crate::repository::{StoreError, UnitOfWorkFactory};
use crate::resilience::{CircuitBreaker, Retry, Settings};

const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS main.users (
        id          INTEGER PRIMARY KEY,
        email       TEXT    NOT NULL,
        username    TEXT    NOT NULL,
        password    TEXT    NOT NULL,
        created_at  TEXT    NOT NULL,
        updated_at  TEXT    NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS main.ledgers (
        id                INTEGER PRIMARY KEY,
        user_id           INTEGER NOT NULL,
        transaction_type  TEXT    NOT NULL,
        token             TEXT    NOT NULL,
        amount            TEXT    NOT NULL,
        created_at        TEXT    NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS main.idx_ledgers_user_id ON ledgers (user_id)",
    "CREATE INDEX IF NOT EXISTS main.idx_ledgers_user_token ON ledgers (user_id, token)",
    "CREATE TABLE IF NOT EXISTS main.idempotency_records (
        id             INTEGER PRIMARY KEY,
        request_type   TEXT    NOT NULL,
        reference_id   INTEGER NOT NULL,
        response_data  TEXT    NOT NULL,
        created_at     TEXT    NOT NULL
    )",
];

/// Everything the services need from the database layer.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
    pub breaker: Arc<CircuitBreaker>,
    pub retry: Arc<Retry<StoreError>>,
    pub unit_of_work_factory: UnitOfWorkFactory,
}

/// Open the pool described by `config`.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(config.create_if_missing)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    tracing::info!(
        url = %config.url,
        max_connections = config.max_connections,
        "Database pool opened"
    );
    Ok(pool)
}

/// Create the tables if they do not exist. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = SCHEMA.len(), "Schema migrated");
    Ok(())
}

pub fn build_breaker(config: &CircuitBreakerConfig) -> CircuitBreaker {
    CircuitBreaker::new(Settings::from_config(config))
}

/// Retry policy that only repeats transient SQLite failures.
pub fn build_retry(config: &RetryConfig) -> Retry<StoreError> {
    Retry::from_config(config).with_retryable(StoreError::is_transient)
}

/// Wire a unit-of-work factory around an existing pool.
pub fn with_pool(pool: SqlitePool, config: &AppConfig) -> Database {
    let breaker = Arc::new(build_breaker(&config.circuit_breaker));
    let retry = Arc::new(build_retry(&config.retries));
    let unit_of_work_factory = UnitOfWorkFactory::new(pool.clone(), breaker.clone(), retry.clone());
    Database {
        pool,
        breaker,
        retry,
        unit_of_work_factory,
    }
}

/// Connect, migrate, and build the shared breaker and retry policy.
pub async fn initialize_database(config: &AppConfig) -> Result<Database, StoreError> {
    let pool = connect(&config.database).await?;
    migrate(&pool).await?;
    Ok(with_pool(pool, config))
}
