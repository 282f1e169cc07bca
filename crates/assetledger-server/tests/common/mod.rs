//! Shared integration-test scaffolding: spin up the real router from
//! `assetledger_server::bootstrap` against a `sqlx::test`-provided pool,
//! bind it to an ephemeral port, and hand back a `reqwest` client plus the
//! base URL. Every test gets its own migrated, empty database — `sqlx::test`
//! runs `assetledger-server/migrations` automatically per test.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assetledger_core::store::asset_items;
use assetledger_core::store::asset_models;
use assetledger_core::store::employees;
use assetledger_core::store::models::{AssetItem, AssetModel, Employee, StockItem};
use assetledger_server::bootstrap::{app_state_with, build_router};
use assetledger_server::config::{RateLimitConfig, ServerConfig};
use assetledger_storage::memory::MemoryCacheBackend;
use sqlx::PgPool;
use uuid::Uuid;

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn(pool: PgPool) -> Self {
        Self::spawn_with_rate_limit(pool, RateLimitConfig {
            auth_tier: 1_000,
            mutation_tier: 1_000,
            general_tier: 1_000,
        })
        .await
    }

    /// Spawn with a specific rate-limit configuration — used by the rate
    /// limiter's own tests, which need a small, deterministic budget.
    pub async fn spawn_with_rate_limit(pool: PgPool, rate_limit: RateLimitConfig) -> Self {
        let config = ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: String::new(),
            database_pool_size: 5,
            cache_url: "memory://".to_owned(),
            access_token_secret: "test-access-secret".to_owned(),
            refresh_token_secret: "test-refresh-secret".to_owned(),
            cors_origins: Vec::new(),
            signatures_dir: "./signatures".to_owned(),
            rate_limit,
            request_timeout: Duration::from_secs(5),
            log_level: "error".to_owned(),
            dev_mode: true,
        };

        let cache = Arc::new(MemoryCacheBackend::new());
        let state = app_state_with(pool, cache, config);
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .unwrap();

        Self {
            base_url: format!("http://{addr}"),
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Seed an asset model directly through the store, bypassing HTTP — every
/// scenario needs one and the route itself is exercised elsewhere.
pub async fn seed_asset_model(pool: &PgPool, asset_type: &str, brand: &str, model_name: &str) -> AssetModel {
    let mut conn = pool.acquire().await.unwrap();
    asset_models::create(&mut conn, asset_type, brand, model_name)
        .await
        .unwrap()
}

pub async fn seed_asset_item(pool: &PgPool, asset_model_id: Uuid, asset_tag: &str) -> AssetItem {
    let mut conn = pool.acquire().await.unwrap();
    asset_items::create(&mut conn, asset_model_id, Some(asset_tag), None)
        .await
        .unwrap()
}

pub async fn seed_employee(pool: &PgPool, first_name: &str, last_name: &str, manager_user_id: Option<Uuid>) -> Employee {
    let mut conn = pool.acquire().await.unwrap();
    employees::create(&mut conn, first_name, last_name, None, None, manager_user_id)
        .await
        .unwrap()
}

/// There is no HTTP route that sets `quantity` directly (C10: the only
/// writer to a stock row outside creation is the loan engine's reservation
/// path), so fixture setup goes through raw SQL exactly as a migration or
/// an operator-run backfill would.
pub async fn seed_stock_item(pool: &PgPool, asset_model_id: Uuid, quantity: i64, loaned: i64) -> StockItem {
    sqlx::query_as::<_, StockItem>(
        "INSERT INTO stock_items (asset_model_id, quantity, loaned)
         VALUES ($1, $2, $3)
         RETURNING id, asset_model_id, quantity, loaned, created_at, updated_at",
    )
    .bind(asset_model_id)
    .bind(quantity)
    .bind(loaned)
    .fetch_one(pool)
    .await
    .unwrap()
}
