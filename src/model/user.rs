use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored user. Serialized as the cached response of `create_user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new user. Id and timestamps are assigned on create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl NewUser {
    pub fn into_user(self, id: i64, now: DateTime<Utc>) -> User {
        User {
            id,
            email: self.email,
            username: self.username,
            password: self.password,
            created_at: now,
            updated_at: now,
        }
    }
}
