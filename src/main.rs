//! Lending Portal Server - equipment lending REST API

use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lending_portal_server::{
    api,
    config::{AppConfig, StorageBackend},
    repository::Repository,
    services::{seed, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("lending_portal_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Lending Portal Server v{}", env!("CARGO_PKG_VERSION"));

    let repository = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            Repository::in_memory()
        }
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database migrations completed");

            Repository::postgres(pool)
        }
    };

    let services = Services::new(repository, config.auth.clone());

    if config.seed.enabled {
        seed::seed_if_empty(&services).await?;
    }

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = api::router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
