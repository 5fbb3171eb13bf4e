use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::idempotency::{Idempotency, RequestType};
use crate::idgen::IdGenerator;
use crate::lifecycle::Context;
use crate::model::{Ledger, NewLedger};
use crate::repository::{LedgerQuery, StoreError, UnitOfWorkFactory};
use crate::service::finish;

/// Ledger lookup filters. Zero and empty values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerParams {
    pub id: i64,
    pub user_id: i64,
    pub transaction_type: String,
    pub token: String,
}

impl From<LedgerParams> for LedgerQuery {
    fn from(params: LedgerParams) -> Self {
        LedgerQuery {
            id: params.id,
            user_id: params.user_id,
            transaction_type: params.transaction_type,
            token: params.token,
        }
    }
}

#[derive(Clone)]
pub struct LedgerService {
    factory: UnitOfWorkFactory,
    idempotency: Idempotency,
    ids: Arc<dyn IdGenerator>,
}

impl LedgerService {
    pub fn new(factory: UnitOfWorkFactory, idempotency: Idempotency, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            factory,
            idempotency,
            ids,
        }
    }

    pub async fn get_ledgers(&self, ctx: &Context, params: LedgerParams) -> Result<Vec<Ledger>> {
        let uow = self.factory.begin().await?;
        let query = LedgerQuery::from(params);
        let result = uow.ledgers().get(ctx, &query).await.map_err(Into::into);
        finish(uow, result).await
    }

    /// Record a ledger entry once per `idempotency_id`.
    pub async fn create_ledger(
        &self,
        ctx: &Context,
        idempotency_id: i64,
        new_ledger: NewLedger,
    ) -> Result<Ledger> {
        let uow = self.factory.begin_write().await?;
        let ledger = new_ledger.into_ledger(self.ids.generate(), Utc::now());

        let result = self
            .idempotency
            .execute(
                ctx,
                uow.idempotency_records(),
                idempotency_id,
                RequestType::CreateLedger,
                ledger.id,
                || async {
                    let ledgers = uow.ledgers();
                    ledgers.insert(ctx, &ledger).await?;
                    let query = LedgerQuery {
                        id: ledger.id,
                        ..Default::default()
                    };
                    let created = ledgers
                        .get(ctx, &query)
                        .await?
                        .into_iter()
                        .next()
                        .ok_or(StoreError::NotFound {
                            entity: "ledger",
                            id: ledger.id,
                        })?;
                    Ok(created)
                },
            )
            .await;

        if let Ok(created) = &result {
            tracing::info!(idempotency_id, ledger_id = created.id, user_id = created.user_id, "Ledger entry created");
        }
        finish(uow, result).await
    }
}
