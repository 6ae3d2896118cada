//! Expiring key-value store used for login throttling and session caching.
//!
//! The store is the only source of time-based state in the login flow: every
//! record is written with a TTL and simply disappears when it lapses.

pub mod memory;
pub mod redis_store;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Key-value store errors.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Value at '{0}' is not an integer")]
    NotAnInteger(String),

    #[error("Store call exceeded {0:?}")]
    Timeout(Duration),
}

/// Operations the login flow needs from an expiring key-value store.
///
/// A miss is `Ok(None)`, never an error. `incr` must be atomic.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Unconditionally write `value` with the given TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Atomically increment an integer counter, creating it at 1 without a TTL.
    async fn incr(&self, key: &str) -> Result<i64, KvError>;

    /// Set a TTL on an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, KvError>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[&str]) -> Result<u64, KvError>;
}

/// Bound a store call by `limit`, mapping an elapsed deadline to [`KvError::Timeout`].
pub async fn within<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, KvError>>,
) -> Result<T, KvError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| KvError::Timeout(limit))?
}
