//! Transaction handle shared by the repositories of one unit of work.

use std::future::Future;
use std::sync::Arc;

use sqlx::{Sqlite, Transaction};
use tokio::sync::Mutex;

use crate::lifecycle::Context;
use crate::repository::StoreError;
use crate::resilience::{CircuitBreaker, Retry};

/// `None` once the unit of work has committed or aborted.
pub type SharedTransaction = Arc<Mutex<Option<Transaction<'static, Sqlite>>>>;

/// What every repository of a unit of work is bound to.
#[derive(Clone)]
pub(crate) struct TransactionScope {
    pub(crate) tx: SharedTransaction,
    breaker: Arc<CircuitBreaker>,
    retry: Arc<Retry<StoreError>>,
}

impl TransactionScope {
    pub(crate) fn new(
        tx: SharedTransaction,
        breaker: Arc<CircuitBreaker>,
        retry: Arc<Retry<StoreError>>,
    ) -> Self {
        Self { tx, breaker, retry }
    }

    /// Breaker outside, retry inside: one breaker outcome per logical call.
    pub(crate) async fn guarded<T, F, Fut>(&self, ctx: &Context, op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.breaker
            .execute(|| self.retry.execute(ctx, op))
            .await
    }
}
