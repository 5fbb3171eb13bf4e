use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::idempotency::{IdempotencyRecord, RecordStore};
use crate::lifecycle::Context;
use crate::repository::scope::TransactionScope;
use crate::repository::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct IdempotencyRecordRow {
    id: i64,
    request_type: String,
    reference_id: i64,
    response_data: String,
    created_at: DateTime<Utc>,
}

impl From<IdempotencyRecordRow> for IdempotencyRecord {
    fn from(row: IdempotencyRecordRow) -> Self {
        IdempotencyRecord {
            id: row.id,
            request_type: row.request_type,
            reference_id: row.reference_id,
            response_data: row.response_data,
            created_at: row.created_at,
        }
    }
}

/// Idempotency records, bound to one transaction.
pub struct IdempotencyRecordRepository {
    scope: TransactionScope,
    not_found_as_error: bool,
}

impl IdempotencyRecordRepository {
    pub(crate) fn new(scope: TransactionScope, not_found_as_error: bool) -> Self {
        Self {
            scope,
            not_found_as_error,
        }
    }
}

#[async_trait]
impl RecordStore for IdempotencyRecordRepository {
    async fn get(&self, ctx: &Context, id: i64) -> Result<Option<IdempotencyRecord>, StoreError> {
        let tx = &self.scope.tx;
        let row = self
            .scope
            .guarded(ctx, move || async move {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
                let row = sqlx::query_as::<_, IdempotencyRecordRow>(
                    "SELECT id, request_type, reference_id, response_data, created_at \
                     FROM main.idempotency_records WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(&mut **conn)
                .await?;
                Ok(row)
            })
            .await?;

        match row {
            Some(row) => Ok(Some(row.into())),
            None if self.not_found_as_error => Err(StoreError::NotFound {
                entity: "idempotency record",
                id,
            }),
            None => Ok(None),
        }
    }

    async fn insert(&self, ctx: &Context, record: &IdempotencyRecord) -> Result<(), StoreError> {
        let tx = &self.scope.tx;
        self.scope
            .guarded(ctx, move || async move {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
                sqlx::query(
                    "INSERT INTO main.idempotency_records \
                     (id, request_type, reference_id, response_data, created_at) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(record.id)
                .bind(record.request_type.as_str())
                .bind(record.reference_id)
                .bind(record.response_data.as_str())
                .bind(record.created_at)
                .execute(&mut **conn)
                .await?;
                Ok(())
            })
            .await
    }
}
