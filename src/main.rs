//! Resilient Store CLI
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI command
//!       │
//!       ▼
//!   handler ──▶ service ──▶ UnitOfWork ──────────────▶ commit / abort
//!                  │            │
//!                  ▼            ▼
//!            Idempotency   repositories
//!                               │
//!                               ▼
//!                 CircuitBreaker(Retry(SQL statement)) ──▶ SQLite
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

use resilient_store::config::{load_config, AppConfig};
use resilient_store::database;
use resilient_store::handler::{CreateLedgerRequest, CreateUserRequest, GetLedgersRequest, GetUserRequest};
use resilient_store::observability::{init_logging, metrics};
use resilient_store::{App, Error, Shutdown};

#[derive(Parser)]
#[command(name = "resilient-store")]
#[command(about = "Idempotent, breaker-guarded writes over SQLite", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema
    Migrate,
    #[command(flatten)]
    Request(RequestCommand),
}

/// Commands served through the handlers.
#[derive(Subcommand)]
enum RequestCommand {
    /// Create a user once per idempotency id
    CreateUser {
        #[arg(long)]
        idempotency_id: i64,
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Fetch a user by id
    GetUser {
        #[arg(long)]
        id: i64,
    },
    /// Record a ledger entry once per idempotency id
    CreateLedger {
        #[arg(long)]
        idempotency_id: i64,
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        transaction_type: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        amount: Decimal,
    },
    /// List ledger entries matching the filters
    Ledgers {
        #[arg(long, default_value_t = 0)]
        id: i64,
        #[arg(long, default_value_t = 0)]
        user_id: i64,
        #[arg(long, default_value = "")]
        transaction_type: String,
        #[arg(long, default_value = "")]
        token: String,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    init_logging(&config.observability);

    tracing::info!("resilient-store v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let command = match cli.command {
        Commands::Migrate => return migrate(&config).await,
        Commands::Request(command) => command,
    };

    let app = App::initialize(&config).await?;
    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();
    let ctx = shutdown.context();

    let output = match command {
        RequestCommand::CreateUser {
            idempotency_id,
            email,
            username,
            password,
        } => {
            let request = CreateUserRequest {
                idempotency_id,
                email,
                username,
                password,
            };
            app.users.create_user(&ctx, request).await.and_then(to_json)
        }
        RequestCommand::GetUser { id } => app
            .users
            .get_user_by_id(&ctx, GetUserRequest { id })
            .await
            .and_then(to_json),
        RequestCommand::CreateLedger {
            idempotency_id,
            user_id,
            transaction_type,
            token,
            amount,
        } => {
            let request = CreateLedgerRequest {
                idempotency_id,
                user_id,
                transaction_type,
                token,
                amount,
            };
            app.ledgers.create_ledger(&ctx, request).await.and_then(to_json)
        }
        RequestCommand::Ledgers {
            id,
            user_id,
            transaction_type,
            token,
        } => {
            let request = GetLedgersRequest {
                id,
                user_id,
                transaction_type,
                token,
            };
            app.ledgers.get_ledgers(&ctx, request).await.and_then(to_json)
        }
    };

    app.database.pool.close().await;

    match output {
        Ok(json) => {
            println!("{json}");
            Ok(())
        }
        Err(err) => {
            let body = ErrorBody {
                error: err.kind().to_string(),
                message: err.to_string(),
            };
            eprintln!("{}", serde_json::to_string_pretty(&body)?);
            std::process::exit(1);
        }
    }
}

async fn migrate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = database::connect(&config.database).await?;
    database::migrate(&pool).await?;
    pool.close().await;
    println!("{}", serde_json::json!({ "migrated": true }));
    Ok(())
}

fn to_json<T: Serialize>(value: T) -> Result<String, Error> {
    serde_json::to_string_pretty(&value).map_err(Error::Encode)
}
