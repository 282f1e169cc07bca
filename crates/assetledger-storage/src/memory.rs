//! In-memory cache backend for tests and single-replica development.
//!
//! Stores entries in a `HashMap` behind a `RwLock`, each tagged with an
//! absolute expiry instant. Expired entries are lazily evicted on access —
//! there is no background sweep, so a backend that is never read from again
//! will hold its last entries until dropped. Fine for tests; a production
//! single-box deployment should still prefer the Redis backend so the rate
//! limiter survives a process restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::{CacheBackend, CacheError};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// An in-memory cache backend backed by a `HashMap`.
///
/// Thread-safe and async-compatible. Data is lost when the process exits.
#[derive(Clone)]
pub struct MemoryCacheBackend {
    data: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryCacheBackend {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let data = self.data.read().await;
        match data.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut data = self.data.write().await;
        data.insert(
            key.to_owned(),
            Entry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let data = self.data.read().await;
        let now = Instant::now();
        let keys = data
            .iter()
            .filter(|(k, entry)| k.starts_with(prefix) && entry.expires_at > now)
            .map(|(k, _)| k.clone())
            .collect();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut data = self.data.write().await;
        data.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_returns_none() {
        let backend = MemoryCacheBackend::new();
        assert_eq!(backend.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_and_get_roundtrip() {
        let backend = MemoryCacheBackend::new();
        backend
            .set("revoked:token:abc", b"1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            backend.get("revoked:token:abc").await.unwrap(),
            Some(b"1".to_vec())
        );
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let backend = MemoryCacheBackend::new();
        backend
            .set("key", b"val", Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let backend = MemoryCacheBackend::new();
        backend.set("key", b"val", Duration::from_secs(60)).await.unwrap();
        backend.delete("key").await.unwrap();
        assert_eq!(backend.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_returns_matching_prefix_only() {
        let backend = MemoryCacheBackend::new();
        backend.set("ratelimit:login:1.1.1.1", b"1", Duration::from_secs(60)).await.unwrap();
        backend.set("ratelimit:login:2.2.2.2", b"1", Duration::from_secs(60)).await.unwrap();
        backend.set("revoked:token:xyz", b"1", Duration::from_secs(60)).await.unwrap();

        let mut keys = backend.scan("ratelimit:login:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["ratelimit:login:1.1.1.1", "ratelimit:login:2.2.2.2"]);
    }

    #[tokio::test]
    async fn scan_excludes_expired_entries() {
        let backend = MemoryCacheBackend::new();
        backend.set("p:a", b"1", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(backend.scan("p:").await.unwrap().is_empty());
    }
}
