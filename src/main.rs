use std::sync::Arc;

use clap::Parser;

use moneyd::api::{self, AppState};
use moneyd::config::{CliArgs, Config};
use moneyd::postgres_storage::PostgresStorage;
use moneyd::sqlite_storage::SqliteStorage;
use moneyd::storage::{seed_default_accounts, StorageBackend};

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    init_tracing(&config);

    let storage: Arc<dyn StorageBackend> = match config.database.backend.as_str() {
        "postgres" => {
            tracing::info!(host = %config.database.host, name = %config.database.name, "Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.database.connection_string())
                    .expect("Failed to connect to PostgreSQL"),
            )
        }
        _ => {
            tracing::info!(path = %config.database.path, "Using SQLite storage");
            Arc::new(SqliteStorage::new(&config.database.path).expect("Failed to open database"))
        }
    };

    seed_default_accounts(storage.as_ref()).expect("Failed to seed default accounts");

    let state = Arc::new(AppState { storage });
    let app = api::router(state);

    let addr = config.listen_addr();
    tracing::info!(%addr, "API listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
