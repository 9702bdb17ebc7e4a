//! # notary-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the DocChain notary and the background
//! anchor repair sweep. Binds to configurable port (default 8080).

use std::sync::Arc;

use notary_anchor::InMemoryLedger;
use notary_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        e
    })?;
    tracing::info!(?config, "Configuration loaded");

    // Optional: absent DATABASE_URL means in-memory only.
    let db_pool = notary_api::db::init_pool(config.database_url.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let port = config.port;
    let sweep_every = config.sweep_interval();
    let ledger = Arc::new(InMemoryLedger::new(config.ledger_network.clone()));
    let state = AppState::with_ledger(config, ledger, db_pool);

    // Hydrate in-memory stores from database (if connected).
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    let service = state.service.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            service.retry_pending_anchors().await;
        }
    });

    let app = notary_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("DocChain notary listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
