//! Use-case orchestration.
//!
//! # Patterns
//! ```text
//! create: begin_write → generate id → Idempotency::execute({ insert; read back }) → commit | abort
//! read:   begin → repository read → commit | abort
//! ```
//!
//! # Design Decisions
//! - Creates hold the write lock from begin, so duplicate requests queue and the later one
//!   reads the earlier one's record
//! - Any error aborts the unit of work and is returned as-is
//! - A failed commit is returned even when the operation itself succeeded
//! - An abort failure is logged; the original error wins

pub mod ledger;
pub mod user;

pub use ledger::{LedgerParams, LedgerService};
pub use user::UserService;

use crate::error::Result;
use crate::repository::UnitOfWork;

/// Commit on success; abort and return the original error otherwise.
pub(crate) async fn finish<T>(uow: UnitOfWork, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = uow.abort().await {
                tracing::warn!(error = %abort_err, original = %err, "Failed to abort unit of work");
            }
            Err(err)
        }
    }
}
