//! Obrafin API Server
//!
//! Main entry point for the reconciliation backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obrafin_api::{AppState, create_router};
use obrafin_db::{CachingStore, QueryCache, SeaStore, connect_pool};
use obrafin_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "obrafin=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect_pool(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    let cache = Arc::new(QueryCache::from_config(&config.cache));
    info!(
        ttl_secs = config.cache.ttl_secs,
        max_capacity = config.cache.max_capacity,
        invalidate_on_write = config.cache.invalidate_on_write,
        "Reference cache configured"
    );
    let store = Arc::new(CachingStore::new(
        SeaStore::new(db),
        cache.clone(),
        config.cache.invalidate_on_write,
    ));

    let state = AppState::new(store, cache, &config);
    let app = create_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
