//! Redis cache backend.
//!
//! Used in production so the token revocation blacklist and rate-limit
//! counters are shared across replicas. Uses a multiplexed async connection,
//! which is cheap to clone and safe to share across tasks.
//!
//! Feature-gated behind `redis-backend` (enabled by default).

use std::time::Duration;

use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::{CacheBackend, CacheError};

/// A cache backend backed by Redis.
///
/// Thread-safe via `ConnectionManager`, which transparently reconnects on
/// failure. All operations are fully async.
#[derive(Clone)]
pub struct RedisCacheBackend {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend").finish_non_exhaustive()
    }
}

impl RedisCacheBackend {
    /// Connect to Redis at the given URL (e.g. `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connect`] if the client cannot be constructed
    /// or the initial connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url).map_err(|e| CacheError::Connect {
            target: redis_url.to_owned(),
            reason: e.to_string(),
        })?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connect {
                target: redis_url.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| CacheError::Read {
            key: key.to_owned(),
            reason: e.to_string(),
        })
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| CacheError::Write {
                key: key.to_owned(),
                reason: e.to_string(),
            })
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");

        let mut iter: redis::AsyncIter<'_, String> = conn
            .scan_match(&pattern)
            .await
            .map_err(|e| CacheError::Scan {
                prefix: prefix.to_owned(),
                reason: e.to_string(),
            })?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next().await {
            keys.push(key);
        }
        drop(iter);

        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(|e| CacheError::Delete {
            key: key.to_owned(),
            reason: e.to_string(),
        })
    }
}
