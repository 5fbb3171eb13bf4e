//! Domain entities.

pub mod ledger;
pub mod user;

pub use ledger::{Ledger, NewLedger};
pub use user::{NewUser, User};
