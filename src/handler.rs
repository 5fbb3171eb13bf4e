//! Request handling: validation in, responses out.
//!
//! # Responsibilities
//! - Reject malformed requests before any storage work
//! - Turn an absent user into `Error::NotFound`
//! - Keep passwords out of responses
//! - Log errors that map to `ErrorKind::Internal`

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::lifecycle::Context;
use crate::model::{Ledger, NewLedger, NewUser, User};
use crate::service::{LedgerParams, LedgerService, UserService};

#[derive(Debug, Clone, Deserialize)]
pub struct GetUserRequest {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub idempotency_id: i64,
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetLedgersRequest {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLedgerRequest {
    pub idempotency_id: i64,
    pub user_id: i64,
    pub transaction_type: String,
    pub token: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerResponse {
    pub id: i64,
    pub user_id: i64,
    pub transaction_type: String,
    pub token: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<Ledger> for LedgerResponse {
    fn from(ledger: Ledger) -> Self {
        Self {
            id: ledger.id,
            user_id: ledger.user_id,
            transaction_type: ledger.transaction_type,
            token: ledger.token,
            amount: ledger.amount,
            created_at: ledger.created_at,
        }
    }
}

fn require_positive(value: i64, field: &str) -> Result<()> {
    if value <= 0 {
        return Err(Error::invalid_argument(format!("{field} must be greater than 0")));
    }
    Ok(())
}

fn require_present(value: &str, field: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_argument(format!("{field} is required")));
    }
    Ok(())
}

/// Log internal failures once, at the boundary.
fn observe<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        match err.kind() {
            ErrorKind::Internal => tracing::error!(operation, error = %err, "Unhandled error"),
            kind => tracing::debug!(operation, %kind, error = %err, "Request failed"),
        }
    }
    result
}

#[derive(Clone)]
pub struct UserHandler {
    users: UserService,
}

impl UserHandler {
    pub fn new(users: UserService) -> Self {
        Self { users }
    }

    pub async fn get_user_by_id(&self, ctx: &Context, request: GetUserRequest) -> Result<UserResponse> {
        let result: Result<UserResponse> = async {
            require_positive(request.id, "id")?;
            match self.users.get_user(ctx, request.id).await? {
                Some(user) => Ok(user.into()),
                None => Err(Error::NotFound(format!("user {}", request.id))),
            }
        }
        .await;
        observe("get_user_by_id", result)
    }

    pub async fn create_user(&self, ctx: &Context, request: CreateUserRequest) -> Result<UserResponse> {
        let result: Result<UserResponse> = async {
            require_positive(request.idempotency_id, "idempotency_id")?;
            require_present(&request.email, "email")?;
            require_present(&request.username, "username")?;
            require_present(&request.password, "password")?;

            let new_user = NewUser {
                email: request.email,
                username: request.username,
                password: request.password,
            };
            let user = self
                .users
                .create_user(ctx, request.idempotency_id, new_user)
                .await?;
            Ok(user.into())
        }
        .await;
        observe("create_user", result)
    }
}

#[derive(Clone)]
pub struct LedgerHandler {
    ledgers: LedgerService,
}

impl LedgerHandler {
    pub fn new(ledgers: LedgerService) -> Self {
        Self { ledgers }
    }

    pub async fn get_ledgers(&self, ctx: &Context, request: GetLedgersRequest) -> Result<Vec<LedgerResponse>> {
        let params = LedgerParams {
            id: request.id,
            user_id: request.user_id,
            transaction_type: request.transaction_type,
            token: request.token,
        };
        let result: Result<Vec<LedgerResponse>> = self
            .ledgers
            .get_ledgers(ctx, params)
            .await
            .map(|ledgers| ledgers.into_iter().map(LedgerResponse::from).collect());
        observe("get_ledgers", result)
    }

    pub async fn create_ledger(&self, ctx: &Context, request: CreateLedgerRequest) -> Result<LedgerResponse> {
        let result: Result<LedgerResponse> = async {
            require_positive(request.idempotency_id, "idempotency_id")?;
            require_positive(request.user_id, "user_id")?;
            require_present(&request.transaction_type, "transaction_type")?;
            require_present(&request.token, "token")?;

            let new_ledger = NewLedger {
                user_id: request.user_id,
                transaction_type: request.transaction_type,
                token: request.token,
                amount: request.amount,
            };
            let ledger = self
                .ledgers
                .create_ledger(ctx, request.idempotency_id, new_ledger)
                .await?;
            Ok(ledger.into())
        }
        .await;
        observe("create_ledger", result)
    }
}
