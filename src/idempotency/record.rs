use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::lifecycle::Context;
use crate::repository::StoreError;

/// Operation kinds that can be replayed from a stored response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    CreateUser,
    CreateLedger,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::CreateUser => "create_user",
            RequestType::CreateLedger => "create_ledger",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored outcome of one idempotent request. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    /// Client-supplied idempotency key.
    pub id: i64,
    pub request_type: String,
    /// Id of the entity the request created.
    pub reference_id: i64,
    /// JSON encoding of the response.
    pub response_data: String,
    pub created_at: DateTime<Utc>,
}

/// Persistence for idempotency records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// `Ok(None)` when no record exists for `id`.
    async fn get(&self, ctx: &Context, id: i64) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Must fail when a record with the same id already exists.
    async fn insert(&self, ctx: &Context, record: &IdempotencyRecord) -> Result<(), StoreError>;
}
