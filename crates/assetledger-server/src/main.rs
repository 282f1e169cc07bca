//! `AssetLedger` server entry point.
//!
//! Bootstraps the Postgres pool, cache backend, token service, and loan
//! engine, then starts the Axum HTTP server with graceful shutdown:
//! `build_app_state` → `build_router` →
//! `axum::serve(...).with_graceful_shutdown(...)`. The assembly itself
//! lives in `assetledger_server::bootstrap` so integration tests can
//! build the same router this binary serves.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use assetledger_server::bootstrap::{build_app_state, build_router, shutdown_signal};
use assetledger_server::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .json()
        .init();

    info!(addr = %config.bind_addr, "AssetLedger starting");

    let state = build_app_state(&config).await?;
    let app = build_router(Arc::clone(&state));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "AssetLedger server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("AssetLedger server stopped");
    Ok(())
}
