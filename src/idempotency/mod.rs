//! At-most-once execution keyed by a client-supplied id.
//!
//! # Data Flow
//! ```text
//! execute(id)
//!     → store.get(id)
//!         hit  → deserialize response_data → return
//!         miss → op() → serialize → store.insert(record) → return op's value
//! ```
//!
//! # Design Decisions
//! - The gate holds no state; uniqueness is the store's primary key
//! - A record that fails to deserialize is an error, never a cache miss
//! - The store must share the transaction of `op`'s writes

pub mod record;

use std::future::Future;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::lifecycle::Context;
use crate::observability::metrics;

pub use record::{IdempotencyRecord, RecordStore, RequestType};

/// Idempotency gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Idempotency;

impl Idempotency {
    pub fn new() -> Self {
        Self
    }

    /// Run `op` once per `id`, replaying its stored result on later calls.
    ///
    /// Errors from the store, from `op`, and from encoding are returned as-is
    /// and leave no record behind. A concurrent insert of the same id
    /// surfaces as the store's uniqueness error.
    pub async fn execute<T, F, Fut>(
        &self,
        ctx: &Context,
        store: &dyn RecordStore,
        id: i64,
        request_type: RequestType,
        reference_id: i64,
        op: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(record) = store.get(ctx, id).await? {
            tracing::debug!(
                idempotency_id = id,
                request_type = %record.request_type,
                reference_id = record.reference_id,
                "Replaying stored response"
            );
            metrics::record_idempotency_hit(request_type.as_str());
            return serde_json::from_str(&record.response_data)
                .map_err(|source| Error::CorruptRecord { id, source });
        }

        metrics::record_idempotency_miss(request_type.as_str());
        let value = op().await?;
        let response_data = serde_json::to_string(&value).map_err(Error::Encode)?;

        store
            .insert(
                ctx,
                &IdempotencyRecord {
                    id,
                    request_type: request_type.as_str().to_string(),
                    reference_id,
                    response_data,
                    created_at: Utc::now(),
                },
            )
            .await?;

        tracing::debug!(idempotency_id = id, %request_type, reference_id, "Stored response");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StoreError;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        name: String,
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<HashMap<i64, IdempotencyRecord>>,
        fail_get: bool,
        fail_insert: bool,
        /// `get` misses even when a record exists, like a reader that raced a writer.
        stale_reads: bool,
    }

    impl MemoryStore {
        fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        fn put_raw(&self, id: i64, response_data: &str) {
            self.records.lock().unwrap().insert(
                id,
                IdempotencyRecord {
                    id,
                    request_type: "create_user".into(),
                    reference_id: 1,
                    response_data: response_data.into(),
                    created_at: Utc::now(),
                },
            );
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn get(&self, _ctx: &Context, id: i64) -> Result<Option<IdempotencyRecord>, StoreError> {
            if self.fail_get {
                return Err(StoreError::TransactionClosed);
            }
            if self.stale_reads {
                return Ok(None);
            }
            Ok(self.records.lock().unwrap().get(&id).cloned())
        }

        async fn insert(&self, _ctx: &Context, record: &IdempotencyRecord) -> Result<(), StoreError> {
            if self.fail_insert {
                return Err(StoreError::TransactionClosed);
            }
            let mut records = self.records.lock().unwrap();
            if records.contains_key(&record.id) {
                return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                    "duplicate idempotency record {}",
                    record.id
                ))));
            }
            records.insert(record.id, record.clone());
            Ok(())
        }
    }

    fn greeting(name: &str) -> Greeting {
        Greeting { name: name.into() }
    }

    #[tokio::test]
    async fn test_second_call_replays_first_result() {
        let store = MemoryStore::default();
        let gate = Idempotency::new();
        let ctx = Context::background();

        let first = gate
            .execute(&ctx, &store, 100, RequestType::CreateUser, 1, || async {
                Ok(greeting("alice"))
            })
            .await
            .unwrap();
        assert_eq!(first, greeting("alice"));
        assert_eq!(store.len(), 1);

        let calls = AtomicU32::new(0);
        let calls = &calls;
        let second = gate
            .execute(&ctx, &store, 100, RequestType::CreateUser, 2, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(greeting("bob"))
            })
            .await
            .unwrap();

        assert_eq!(second, greeting("alice"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_stored_record_fields() {
        let store = MemoryStore::default();
        Idempotency::new()
            .execute(&Context::background(), &store, 7, RequestType::CreateLedger, 99, || async {
                Ok(greeting("carol"))
            })
            .await
            .unwrap();

        let record = store.records.lock().unwrap().get(&7).cloned().unwrap();
        assert_eq!(record.request_type, "create_ledger");
        assert_eq!(record.reference_id, 99);
        assert_eq!(
            serde_json::from_str::<Greeting>(&record.response_data).unwrap(),
            greeting("carol")
        );
    }

    #[tokio::test]
    async fn test_op_error_writes_no_record_and_retry_reruns() {
        let store = MemoryStore::default();
        let gate = Idempotency::new();
        let ctx = Context::background();

        let failed = gate
            .execute(&ctx, &store, 5, RequestType::CreateUser, 1, || async {
                Err::<Greeting, _>(Error::invalid_argument("boom"))
            })
            .await;
        assert!(matches!(failed, Err(Error::InvalidArgument(_))));
        assert_eq!(store.len(), 0);

        let calls = AtomicU32::new(0);
        let calls = &calls;
        let retried = gate
            .execute(&ctx, &store, 5, RequestType::CreateUser, 1, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(greeting("dave"))
            })
            .await
            .unwrap();
        assert_eq!(retried, greeting("dave"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_error_skips_op() {
        let store = MemoryStore {
            fail_get: true,
            ..Default::default()
        };
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = Idempotency::new()
            .execute(&Context::background(), &store, 1, RequestType::CreateUser, 1, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(greeting("erin"))
            })
            .await;

        assert!(matches!(result, Err(Error::Store(StoreError::TransactionClosed))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error_not_a_miss() {
        let store = MemoryStore::default();
        store.put_raw(3, "{not json");
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = Idempotency::new()
            .execute(&Context::background(), &store, 3, RequestType::CreateUser, 1, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(greeting("frank"))
            })
            .await;

        assert!(matches!(result, Err(Error::CorruptRecord { id: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_record_of_wrong_shape_is_corrupt() {
        let store = MemoryStore::default();
        store.put_raw(4, r#"{"unexpected": true}"#);

        let result = Idempotency::new()
            .execute(&Context::background(), &store, 4, RequestType::CreateUser, 1, || async {
                Ok(greeting("gina"))
            })
            .await;

        assert!(matches!(result, Err(Error::CorruptRecord { id: 4, .. })));
    }

    #[tokio::test]
    async fn test_encode_failure_writes_no_record() {
        // JSON object keys must be strings
        let mut unencodable = HashMap::new();
        unencodable.insert((1, 2), "value".to_string());
        let store = MemoryStore::default();

        let result = Idempotency::new()
            .execute(&Context::background(), &store, 8, RequestType::CreateUser, 1, move || async move {
                Ok(unencodable)
            })
            .await;

        assert!(matches!(result, Err(Error::Encode(_))));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_insert_error_propagates() {
        let store = MemoryStore {
            fail_insert: true,
            ..Default::default()
        };

        let result = Idempotency::new()
            .execute(&Context::background(), &store, 9, RequestType::CreateUser, 1, || async {
                Ok(greeting("hank"))
            })
            .await;

        assert!(matches!(result, Err(Error::Store(StoreError::TransactionClosed))));
    }

    #[tokio::test]
    async fn test_duplicate_insert_after_a_missed_read_is_an_error() {
        let store = MemoryStore {
            stale_reads: true,
            ..Default::default()
        };
        store.put_raw(5, r#"{"name":"winner"}"#);

        let result = Idempotency::new()
            .execute(&Context::background(), &store, 5, RequestType::CreateUser, 2, || async {
                Ok(greeting("loser"))
            })
            .await;

        assert!(matches!(result, Err(Error::Store(StoreError::Database(_)))));
        let stored = store.records.lock().unwrap().get(&5).cloned().unwrap();
        assert_eq!(stored.response_data, r#"{"name":"winner"}"#);
    }
}
