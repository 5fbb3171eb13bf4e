use chrono::{DateTime, Utc};

use crate::lifecycle::Context;
use crate::model::User;
use crate::repository::scope::TransactionScope;
use crate::repository::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    username: String,
    password: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            username: row.username,
            password: row.password,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Users, bound to one transaction.
pub struct UserRepository {
    scope: TransactionScope,
    not_found_as_error: bool,
}

impl UserRepository {
    pub(crate) fn new(scope: TransactionScope, not_found_as_error: bool) -> Self {
        Self {
            scope,
            not_found_as_error,
        }
    }

    pub async fn get(&self, ctx: &Context, id: i64) -> Result<Option<User>, StoreError> {
        let tx = &self.scope.tx;
        let row = self
            .scope
            .guarded(ctx, move || async move {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
                let row = sqlx::query_as::<_, UserRow>(
                    "SELECT id, email, username, password, created_at, updated_at \
                     FROM main.users WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(&mut **conn)
                .await?;
                Ok(row)
            })
            .await?;

        match row {
            Some(row) => Ok(Some(row.into())),
            None if self.not_found_as_error => Err(StoreError::NotFound { entity: "user", id }),
            None => Ok(None),
        }
    }

    pub async fn insert(&self, ctx: &Context, user: &User) -> Result<(), StoreError> {
        let tx = &self.scope.tx;
        self.scope
            .guarded(ctx, move || async move {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionClosed)?;
                sqlx::query(
                    "INSERT INTO main.users (id, email, username, password, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(user.id)
                .bind(user.email.as_str())
                .bind(user.username.as_str())
                .bind(user.password.as_str())
                .bind(user.created_at)
                .bind(user.updated_at)
                .execute(&mut **conn)
                .await?;
                Ok(())
            })
            .await
    }
}
