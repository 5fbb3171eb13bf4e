use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite};

use crate::lifecycle::Context;
use crate::model::Ledger;
use crate::repository::scope::TransactionScope;
use crate::repository::StoreError;

/// Ledger filter. Zero ids and empty strings match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerQuery {
    pub id: i64,
    pub user_id: i64,
    pub transaction_type: String,
    pub token: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    id: i64,
    user_id: i64,
    transaction_type: String,
    token: String,
    amount: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for Ledger {
    type Error = StoreError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let amount = Decimal::from_str(&row.amount).map_err(|e| StoreError::Decode {
            column: "amount",
            message: e.to_string(),
        })?;
        Ok(Ledger {
            id: row.id,
            user_id: row.user_id,
            transaction_type: row.transaction_type,
            token: row.token,
            amount,
            created_at: row.created_at,
        })
    }
}

fn select_ledgers(query: &LedgerQuery) -> QueryBuilder<'_, Sqlite> {
    let mut builder = QueryBuilder::new(
        "SELECT id, user_id, transaction_type, token, amount, created_at FROM main.ledgers WHERE 1 = 1",
    );
    if query.id != 0 {
        builder.push(" AND id = ").push_bind(query.id);
    }
    if query.user_id != 0 {
        builder.push(" AND user_id = ").push_bind(query.user_id);
    }
    if !query.transaction_type.is_empty() {
        builder
            .push(" AND transaction_type = ")
            .push_bind(query.transaction_type.as_str());
    }
    if !query.token.is_empty() {
        builder.push(" AND token = ").push_bind(query.token.as_str());
    }
    builder.push(" ORDER BY id");
    builder
}

/// Ledger entries, bound to one transaction.
pub struct LedgerRepository {
    scope: TransactionScope,
}

impl LedgerRepository {
    pub(crate) fn new(scope: TransactionScope) -> Self {
        Self { scope }
    }

    pub async fn get(&self, ctx: &Context, query: &LedgerQuery) -> Result<Vec<Ledger>, StoreError> {
        let tx = &self.scope.tx;
        let rows = self
            .scope
            .guarded(ctx, move || async move {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
                let rows = select_ledgers(query)
                    .build_query_as::<LedgerRow>()
                    .fetch_all(&mut **conn)
                    .await?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(Ledger::try_from).collect()
    }

    pub async fn insert(&self, ctx: &Context, ledger: &Ledger) -> Result<(), StoreError> {
        let tx = &self.scope.tx;
        let amount = ledger.amount.to_string();
        let amount = amount.as_str();
        self.scope
            .guarded(ctx, move || async move {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
                sqlx::query(
                    "INSERT INTO main.ledgers (id, user_id, transaction_type, token, amount, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(ledger.id)
                .bind(ledger.user_id)
                .bind(ledger.transaction_type.as_str())
                .bind(ledger.token.as_str())
                .bind(amount)
                .bind(ledger.created_at)
                .execute(&mut **conn)
                .await?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;

    #[test]
    fn test_empty_query_has_no_filters() {
        let query = LedgerQuery::default();
        let mut builder = select_ledgers(&query);
        let sql = builder.build().sql().to_string();
        assert!(sql.ends_with("WHERE 1 = 1 ORDER BY id"));
    }

    #[test]
    fn test_query_filters() {
        let query = LedgerQuery {
            user_id: 42,
            token: "USDT".into(),
            ..Default::default()
        };
        let mut builder = select_ledgers(&query);
        let sql = builder.build().sql().to_string();
        assert!(sql.contains("AND user_id = ?"));
        assert!(sql.contains("AND token = ?"));
        assert!(!sql.contains("AND id = ?"));
        assert!(!sql.contains("transaction_type = ?"));
    }

    #[test]
    fn test_bad_amount_is_a_decode_error() {
        let row = LedgerRow {
            id: 1,
            user_id: 2,
            transaction_type: "deposit".into(),
            token: "USDT".into(),
            amount: "ten".into(),
            created_at: Utc::now(),
        };
        assert!(matches!(
            Ledger::try_from(row),
            Err(StoreError::Decode { column: "amount", .. })
        ));
    }
}
