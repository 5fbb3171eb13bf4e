//! Transactional repositories and the unit of work that owns them.
//!
//! # Data Flow
//! ```text
//! UnitOfWorkFactory::begin() | begin_write()
//!     → pool.begin() (one SQLite transaction; begin_write also takes the write lock)
//!     → UnitOfWork
//!         → users() / ledgers() / idempotency_records()
//!             each call: CircuitBreaker::execute(Retry::execute(statement))
//!     → commit() | abort()
//! ```
//!
//! # Design Decisions
//! - One breaker and one retry policy per database, shared by every repository
//! - Repositories are built lazily, once per unit of work
//! - `commit` and `abort` consume the unit of work; dropping it rolls back

pub mod error;
pub mod idempotency_record;
pub mod ledger;
pub(crate) mod scope;
pub mod user;

use std::sync::{Arc, OnceLock};

use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;

use crate::resilience::{CircuitBreaker, Retry};

pub use error::{is_transient_sqlx, StoreError};
pub use idempotency_record::IdempotencyRecordRepository;
pub use ledger::{LedgerQuery, LedgerRepository};
pub use scope::SharedTransaction;
pub use user::UserRepository;

use scope::TransactionScope;

/// A write that matches no rows. As the first statement of a deferred
/// transaction it acquires the write lock, waiting out the busy timeout.
const CLAIM_WRITE_LOCK: &str = "UPDATE main.idempotency_records SET id = id WHERE 0";

/// Opens units of work against one pool, all sharing one breaker and retry policy.
#[derive(Clone)]
pub struct UnitOfWorkFactory {
    pool: SqlitePool,
    breaker: Arc<CircuitBreaker>,
    retry: Arc<Retry<StoreError>>,
}

impl UnitOfWorkFactory {
    pub fn new(pool: SqlitePool, breaker: Arc<CircuitBreaker>, retry: Arc<Retry<StoreError>>) -> Self {
        Self {
            pool,
            breaker,
            retry,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Begin a read transaction. No unit of work exists if this fails.
    ///
    /// SQLite takes the snapshot at the first read; a later write in the same
    /// unit of work fails with BUSY_SNAPSHOT if another writer committed first.
    pub async fn begin(&self) -> Result<UnitOfWork, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(self.unit_of_work(tx))
    }

    /// Begin a transaction that holds the database write lock from the start,
    /// the same as `BEGIN IMMEDIATE`.
    ///
    /// Writers queue here under the busy timeout, so every read inside the
    /// unit of work sees the latest committed state.
    pub async fn begin_write(&self) -> Result<UnitOfWork, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(CLAIM_WRITE_LOCK).execute(&mut *tx).await?;
        Ok(self.unit_of_work(tx))
    }

    fn unit_of_work(&self, tx: Transaction<'static, Sqlite>) -> UnitOfWork {
        UnitOfWork {
            scope: TransactionScope::new(
                Arc::new(Mutex::new(Some(tx))),
                self.breaker.clone(),
                self.retry.clone(),
            ),
            users: OnceLock::new(),
            ledgers: OnceLock::new(),
            idempotency_records: OnceLock::new(),
        }
    }
}

/// One transaction and the repositories bound to it. Owned by a single request.
pub struct UnitOfWork {
    scope: TransactionScope,
    users: OnceLock<UserRepository>,
    ledgers: OnceLock<LedgerRepository>,
    idempotency_records: OnceLock<IdempotencyRecordRepository>,
}

impl UnitOfWork {
    pub fn users(&self) -> &UserRepository {
        self.users
            .get_or_init(|| UserRepository::new(self.scope.clone(), false))
    }

    pub fn ledgers(&self) -> &LedgerRepository {
        self.ledgers
            .get_or_init(|| LedgerRepository::new(self.scope.clone()))
    }

    pub fn idempotency_records(&self) -> &IdempotencyRecordRepository {
        self.idempotency_records
            .get_or_init(|| IdempotencyRecordRepository::new(self.scope.clone(), false))
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        let tx = self.take().await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn abort(self) -> Result<(), StoreError> {
        let tx = self.take().await?;
        tx.rollback().await?;
        Ok(())
    }

    async fn take(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        self.scope
            .tx
            .lock()
            .await
            .take()
            .ok_or(StoreError::TransactionClosed)
    }
}
