use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::idempotency::{Idempotency, RequestType};
use crate::idgen::IdGenerator;
use crate::lifecycle::Context;
use crate::model::{NewUser, User};
use crate::repository::{StoreError, UnitOfWorkFactory};
use crate::service::finish;

#[derive(Clone)]
pub struct UserService {
    factory: UnitOfWorkFactory,
    idempotency: Idempotency,
    ids: Arc<dyn IdGenerator>,
}

impl UserService {
    pub fn new(factory: UnitOfWorkFactory, idempotency: Idempotency, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            factory,
            idempotency,
            ids,
        }
    }

    /// `Ok(None)` when the user does not exist.
    pub async fn get_user(&self, ctx: &Context, id: i64) -> Result<Option<User>> {
        let uow = self.factory.begin().await?;
        let result = uow.users().get(ctx, id).await.map_err(Into::into);
        finish(uow, result).await
    }

    /// Create a user once per `idempotency_id`; repeats return the first result.
    pub async fn create_user(&self, ctx: &Context, idempotency_id: i64, new_user: NewUser) -> Result<User> {
        let uow = self.factory.begin_write().await?;
        let user = new_user.into_user(self.ids.generate(), Utc::now());
        let reference_id = user.id;

        let result = self
            .idempotency
            .execute(
                ctx,
                uow.idempotency_records(),
                idempotency_id,
                RequestType::CreateUser,
                reference_id,
                || async {
                    let users = uow.users();
                    users.insert(ctx, &user).await?;
                    let created = users.get(ctx, user.id).await?.ok_or(StoreError::NotFound {
                        entity: "user",
                        id: user.id,
                    })?;
                    Ok(created)
                },
            )
            .await;

        if let Ok(created) = &result {
            tracing::info!(idempotency_id, user_id = created.id, "User created");
        }
        finish(uow, result).await
    }
}
