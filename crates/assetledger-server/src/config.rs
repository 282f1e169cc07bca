//! Server configuration for `AssetLedger`.
//!
//! Loaded once at startup from environment variables.
//! `ACCESS_TOKEN_SECRET`/`REFRESH_TOKEN_SECRET` are mandatory outside
//! development — a missing signing secret must fail the process at
//! boot, never silently fall back to a default that an operator could
//! ship to production by accident.

use std::net::SocketAddr;
use std::time::Duration;

/// Rate limit budgets for the three tiers named in the rate limiter
/// design (C11).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub auth_tier: u32,
    pub mutation_tier: u32,
    pub general_tier: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_tier: 5,
            mutation_tier: 30,
            general_tier: 100,
        }
    }
}

/// Process-wide server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub database_pool_size: u32,
    pub cache_url: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub cors_origins: Vec<String>,
    pub signatures_dir: String,
    pub rate_limit: RateLimitConfig,
    pub request_timeout: Duration,
    pub log_level: String,
    pub dev_mode: bool,
}

/// Failure reason for [`ServerConfig::from_env`], distinct from a panic so
/// `main` can log and exit with a clean non-zero status instead of
/// unwinding.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingRequired(&'static str),

    #[error("{0} must be set to a non-empty value outside development mode")]
    MissingInProduction(&'static str),

    #[error("CORS_ORIGINS must name at least one origin outside development mode")]
    EmptyCorsOrigins,
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// Environment variables:
    /// - `BIND_ADDR` — socket address to bind (default `0.0.0.0:8080`)
    /// - `DATABASE_URL` — Postgres DSN, mandatory
    /// - `DATABASE_POOL_SIZE` — max pool connections (default 15)
    /// - `CACHE_URL` — cache backend DSN, mandatory
    /// - `ACCESS_TOKEN_SECRET`, `REFRESH_TOKEN_SECRET` — signing keys,
    ///   mandatory outside `NODE_ENV=development`
    /// - `CORS_ORIGINS` — comma-separated allow-list, mandatory
    ///   (non-empty) outside development
    /// - `SIGNATURES_DIR` — path for signature blobs (default
    ///   `./signatures`)
    /// - `RATE_LIMIT_AUTH`, `RATE_LIMIT_MUTATION`, `RATE_LIMIT_GENERAL` —
    ///   per-tier budgets, defaults 5/30/100
    /// - `REQUEST_TIMEOUT_MS` — default 30000
    /// - `NODE_ENV` — `development` relaxes the mandatory-secret and
    ///   CORS checks, substituting fixed dev defaults
    /// - `RUST_LOG` / `ASSETLEDGER_LOG_LEVEL` — tracing filter (default
    ///   `info`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a mandatory variable is unset outside
    /// development mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dev_mode = std::env::var("NODE_ENV")
            .map(|v| v == "development")
            .unwrap_or(false);

        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingRequired("DATABASE_URL"))?;

        let database_pool_size = std::env::var("DATABASE_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);

        let cache_url =
            std::env::var("CACHE_URL").map_err(|_| ConfigError::MissingRequired("CACHE_URL"))?;

        let access_token_secret = match std::env::var("ACCESS_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if dev_mode => "dev-only-access-secret-do-not-use-in-production".to_owned(),
            _ => return Err(ConfigError::MissingInProduction("ACCESS_TOKEN_SECRET")),
        };

        let refresh_token_secret = match std::env::var("REFRESH_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if dev_mode => "dev-only-refresh-secret-do-not-use-in-production".to_owned(),
            _ => return Err(ConfigError::MissingInProduction("REFRESH_TOKEN_SECRET")),
        };

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();

        if cors_origins.is_empty() && !dev_mode {
            return Err(ConfigError::EmptyCorsOrigins);
        }

        let signatures_dir =
            std::env::var("SIGNATURES_DIR").unwrap_or_else(|_| "./signatures".to_owned());

        let rate_limit = RateLimitConfig {
            auth_tier: env_u32("RATE_LIMIT_AUTH", 5),
            mutation_tier: env_u32("RATE_LIMIT_MUTATION", 30),
            general_tier: env_u32("RATE_LIMIT_GENERAL", 100),
        };

        let request_timeout = Duration::from_millis(env_u32("REQUEST_TIMEOUT_MS", 30_000).into());

        let log_level = std::env::var("ASSETLEDGER_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_owned());

        Ok(Self {
            bind_addr,
            database_url,
            database_pool_size,
            cache_url,
            access_token_secret,
            refresh_token_secret,
            cors_origins,
            signatures_dir,
            rate_limit,
            request_timeout,
            log_level,
            dev_mode,
        })
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
