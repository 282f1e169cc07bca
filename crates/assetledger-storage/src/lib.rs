//! Cache backend abstraction for `AssetLedger`.
//!
//! The rest of the system treats this crate as a hint, never a source of
//! truth: the token service's revocation blacklist and the rate limiter are
//! the only consumers, and both are designed to fail open — a cache miss or
//! a cache outage is read as "nothing recorded", never as "denied" or
//! "allowed". See `assetledger-core::token` for the one exception
//! (revocation checks), where that tradeoff is made explicit.

use std::time::Duration;

pub mod error;
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis_backend;

pub use error::CacheError;
pub use memory::MemoryCacheBackend;
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisCacheBackend;

/// A pluggable key-value cache with per-key TTLs.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`)
/// and cheap to clone (an `Arc`-wrapped handle, a connection pool, or
/// similar).
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value by key. Returns `Ok(None)` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Read`] on backend failure. Callers on the
    /// fail-open path should treat this the same as `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value with the given time-to-live.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Write`] on backend failure.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// List all keys sharing the given prefix.
    ///
    /// Uses a cursor-based scan rather than a blocking `KEYS` command so a
    /// large keyspace never stalls the backend.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Scan`] on backend failure.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>, CacheError>;

    /// Remove a key. A no-op if the key is already absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Delete`] on backend failure.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
