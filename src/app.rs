//! Startup wiring: config → database → services → handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{self, Database};
use crate::error::Result;
use crate::idempotency::Idempotency;
use crate::idgen::{pod_node_id, IdGenerator, Snowflake};
use crate::handler::{LedgerHandler, UserHandler};
use crate::service::{LedgerService, UserService};

#[derive(Clone)]
pub struct App {
    pub database: Database,
    pub users: UserHandler,
    pub ledgers: LedgerHandler,
}

impl App {
    /// Connect and migrate the database, then build the handlers.
    pub async fn initialize(config: &AppConfig) -> Result<Self> {
        let node_id = match config.id_generator.node_id {
            Some(node_id) => node_id,
            None => pod_node_id()?,
        };
        let ids: Arc<dyn IdGenerator> = Arc::new(Snowflake::new(node_id)?);
        tracing::info!(node_id, "Id generator ready");

        let database = database::initialize_database(config).await?;
        Ok(Self::from_parts(database, ids))
    }

    pub fn from_parts(database: Database, ids: Arc<dyn IdGenerator>) -> Self {
        let idempotency = Idempotency::new();
        let factory = database.unit_of_work_factory.clone();
        Self {
            users: UserHandler::new(UserService::new(factory.clone(), idempotency, ids.clone())),
            ledgers: LedgerHandler::new(LedgerService::new(factory, idempotency, ids)),
            database,
        }
    }
}
