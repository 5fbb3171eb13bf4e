use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub id: i64,
    pub user_id: i64,
    pub transaction_type: String,
    pub token: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedger {
    pub user_id: i64,
    pub transaction_type: String,
    pub token: String,
    pub amount: Decimal,
}

impl NewLedger {
    pub fn into_ledger(self, id: i64, now: DateTime<Utc>) -> Ledger {
        Ledger {
            id,
            user_id: self.user_id,
            transaction_type: self.transaction_type,
            token: self.token,
            amount: self.amount,
            created_at: now,
        }
    }
}
