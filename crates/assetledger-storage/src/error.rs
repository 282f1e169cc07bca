//! Cache storage error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger.

/// Errors that can occur during cache backend operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to connect to the backend at startup.
    #[error("failed to connect to cache backend at '{target}': {reason}")]
    Connect { target: String, reason: String },

    /// Failed to read a value from the cache.
    #[error("failed to read key '{key}': {reason}")]
    Read { key: String, reason: String },

    /// Failed to write a value to the cache.
    #[error("failed to write key '{key}': {reason}")]
    Write { key: String, reason: String },

    /// Failed to delete a key from the cache.
    #[error("failed to delete key '{key}': {reason}")]
    Delete { key: String, reason: String },

    /// Failed to scan keys with the given prefix.
    #[error("failed to scan prefix '{prefix}': {reason}")]
    Scan { prefix: String, reason: String },
}
