//! Process bootstrap: pool/cache/router assembly, factored out of `main`
//! so integration tests can build the same router the binary serves
//! without going through environment variables or a real `TcpListener`.

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::middleware as axum_mw;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use assetledger_core::loans::LoanEngine;
use assetledger_core::token::TokenService;
use assetledger_storage::memory::MemoryCacheBackend;
use assetledger_storage::CacheBackend;

use crate::config::ServerConfig;
use crate::middleware::{auth_middleware, tiered_rate_limit_layer, timeout_layer};
use crate::routes;
use crate::state::AppState;

/// Build the shared application state: connect the pool, run migrations,
/// construct the cache backend named by `CACHE_URL`, and wire the token
/// service and loan engine on top of the pool.
pub async fn build_app_state(config: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_pool_size)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    let cache: Arc<dyn CacheBackend> = build_cache_backend(&config.cache_url).await?;
    Ok(app_state_with(pool, cache, config.clone()))
}

/// Assemble `AppState` from an already-connected pool and cache backend —
/// the path integration tests take, since they run migrations themselves
/// via `sqlx::test`'s fixture support rather than through `DATABASE_URL`.
#[must_use]
pub fn app_state_with(
    pool: sqlx::PgPool,
    cache: Arc<dyn CacheBackend>,
    config: ServerConfig,
) -> Arc<AppState> {
    let tokens = TokenService::new(
        &config.access_token_secret,
        &config.refresh_token_secret,
        Arc::clone(&cache),
    );
    let loans = LoanEngine::new(pool.clone());

    Arc::new(AppState {
        pool,
        cache,
        tokens,
        loans,
        config: Arc::new(config),
    })
}

/// `CACHE_URL` of `memory://` selects the in-process backend (single
/// replica only); anything starting `redis://`/`rediss://` selects the
/// Redis-backed implementation.
async fn build_cache_backend(cache_url: &str) -> anyhow::Result<Arc<dyn CacheBackend>> {
    if cache_url.starts_with("redis://") || cache_url.starts_with("rediss://") {
        #[cfg(feature = "redis-backend")]
        {
            let backend = assetledger_storage::RedisCacheBackend::connect(cache_url)
                .await
                .context("failed to connect to Redis cache backend")?;
            return Ok(Arc::new(backend));
        }
        #[cfg(not(feature = "redis-backend"))]
        anyhow::bail!("redis CACHE_URL given but the redis-backend feature is not enabled");
    }

    info!("using in-memory cache backend (not shared across replicas)");
    Ok(Arc::new(MemoryCacheBackend::new()))
}

/// Build the Axum router: unauthenticated routes (`/healthz`, `/readyz`,
/// `/auth/*`) plus every resource route nested behind `auth_middleware`.
/// The tiered rate limiter runs ahead of everything, including the
/// unauthenticated routes, so login/register abuse is capped regardless of
/// auth state.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .merge(routes::health::router())
        .nest("/auth", routes::auth::router());

    let authenticated_routes = Router::new()
        .nest("/employees", routes::employees::router())
        .nest("/asset-models", routes::asset_models::router())
        .nest("/asset-items", routes::asset_items::router())
        .nest("/stock-items", routes::stock_items::router())
        .nest("/loans", routes::loans::router())
        .nest("/audit", routes::audit::router())
        .nest("/users", routes::users::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let cors = build_cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            tiered_rate_limit_layer,
        ))
        .layer(axum_mw::from_fn_with_state(Arc::clone(&state), timeout_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
}

/// Wait for SIGINT or SIGTERM before returning, so `axum::serve` can drain
/// in-flight requests before the process exits.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, draining in-flight requests");
}
