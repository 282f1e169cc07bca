//! Shared application state.
//!
//! A single [`AppState`] is built at startup and handed to every Axum
//! handler via `State`: an `Arc`-wrapped, cheaply-cloned state struct.

use std::sync::Arc;

use assetledger_core::loans::LoanEngine;
use assetledger_core::token::TokenService;
use assetledger_storage::CacheBackend;
use sqlx::PgPool;

use crate::config::ServerConfig;

/// Shared state passed to all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<dyn CacheBackend>,
    pub tokens: TokenService,
    pub loans: LoanEngine,
    pub config: Arc<ServerConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
