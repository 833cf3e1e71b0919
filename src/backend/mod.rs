//! Cache backend implementations.
//!
//! A backend is a plain key-value store with optional TTL. Tag invalidation is
//! built on top of it with *version tokens*: every tag (and the guest page
//! region) owns a token stored under its own key, entries remember the tokens
//! current when they were written, and a flush simply rotates the token.
//! Backends only need to make a single token rotation atomic.

use crate::error::Result;
use std::time::Duration;
use uuid::Uuid;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Generate a fresh version token.
pub fn new_version_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Trait for cache backend implementations.
///
/// All methods take `&self`; implementations use interior mutability or
/// external storage so one backend can be shared by the tagged entry cache and
/// the guest page cache.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve raw bytes by key. `Ok(None)` is a miss.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store bytes with an optional TTL (`None` keeps the entry until removed).
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a live entry exists.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Bulk get. Default implementation calls `get()` per key.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key).await?);
        }
        Ok(results)
    }

    /// Read the version token stored under `key`, creating one when absent.
    ///
    /// The default implementation is get-then-set; two callers racing on an
    /// absent key may each see their own token, which only costs a spurious
    /// miss. Backends with an atomic "set if absent" should override it.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn version(&self, key: &str) -> Result<String> {
        if let Some(bytes) = self.get(key).await? {
            if let Ok(token) = String::from_utf8(bytes) {
                return Ok(token);
            }
        }
        let token = new_version_token();
        self.set(key, token.clone().into_bytes(), None).await?;
        Ok(token)
    }

    /// Replace the token under `key`, returning the new one.
    ///
    /// Everything stamped with the previous token is stale from this point on.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    async fn rotate_version(&self, key: &str) -> Result<String> {
        let token = new_version_token();
        self.set(key, token.clone().into_bytes(), None).await?;
        Ok(token)
    }

    /// Health check - verify backend is accessible.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Optional: Clear every key (use with caution).
    ///
    /// # Errors
    /// Returns `Err` if operation is not implemented or fails
    async fn clear_all(&self) -> Result<()> {
        Err(crate::error::Error::NotImplemented(
            "clear_all not implemented for this backend".to_string(),
        ))
    }
}
