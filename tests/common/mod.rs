//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use resilient_store::config::AppConfig;
use resilient_store::database::{self, Database};
use resilient_store::idgen::Snowflake;
use resilient_store::model::User;
use resilient_store::App;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// A migrated database in a temporary directory, wired into an `App`.
pub struct TestApp {
    pub app: App,
    pub config: AppConfig,
    _dir: TempDir,
}

impl TestApp {
    pub fn db(&self) -> &Database {
        &self.app.database
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.app.database.pool
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM main.{table}"))
            .fetch_one(self.pool())
            .await
            .unwrap()
    }
}

/// Fast retries, two pooled connections, node id 1.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.max_connections = 2;
    config.retries.max_attempts = 2;
    config.retries.base_delay_ms = 1;
    config.retries.max_delay_ms = 5;
    config.retries.jitter = false;
    config.id_generator.node_id = Some(1);
    config
}

pub async fn start_app(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.database.url = format!("sqlite://{}", dir.path().join("store.db").display());
    configure(&mut config);

    let database = database::initialize_database(&config).await.unwrap();
    let ids = Arc::new(Snowflake::new(config.id_generator.node_id.unwrap_or(1)).unwrap());
    TestApp {
        app: App::from_parts(database, ids),
        config,
        _dir: dir,
    }
}

pub fn sample_user(id: i64) -> User {
    let now = Utc::now();
    User {
        id,
        email: format!("user{id}@example.com"),
        username: format!("user{id}"),
        password: "secret".to_string(),
        created_at: now,
        updated_at: now,
    }
}
