//! In-memory cache backend (default, thread-safe, async).
//!
//! Uses DashMap for per-key sharded access. Expired entries are dropped lazily
//! on access or in bulk with [`InMemoryBackend::purge_expired`].

use super::{new_version_token, CacheBackend};
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct StoredBytes {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredBytes {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        StoredBytes { data, expires_at }
    }

    fn token() -> Self {
        StoredBytes::new(new_version_token().into_bytes(), None)
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Thread-safe in-memory backend.
///
/// Clones share the same map, so a single instance can back both the tagged
/// entry cache and the guest page cache.
///
/// ```no_run
/// use forge_cache::backend::{CacheBackend, InMemoryBackend};
/// use std::time::Duration;
///
/// # async fn demo() -> forge_cache::Result<()> {
/// let backend = InMemoryBackend::new();
/// backend.set("forge:home", b"<html/>".to_vec(), Some(Duration::from_secs(60))).await?;
/// assert!(backend.get("forge:home").await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, StoredBytes>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            debug!("InMemory PURGE removed {} expired entries", removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.store.len(),
            expired_entries: self.store.iter().filter(|e| e.is_expired()).count(),
            total_bytes: self.store.iter().map(|e| e.data.len()).sum(),
        }
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                debug!("InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
        }

        // Lazy expiry: the guard above is released before removal.
        self.store.remove_if(key, |_, entry| entry.is_expired());
        debug!("InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.store.insert(key.to_string(), StoredBytes::new(value, ttl));
        debug!("InMemory SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("InMemory DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.get(key).is_some_and(|entry| !entry.is_expired()))
    }

    async fn version(&self, key: &str) -> Result<String> {
        // The shard lock held by `entry` makes initialisation atomic.
        let mut slot = self
            .store
            .entry(key.to_string())
            .or_insert_with(StoredBytes::token);
        if slot.is_expired() || std::str::from_utf8(&slot.data).is_err() {
            *slot = StoredBytes::token();
        }
        Ok(String::from_utf8_lossy(&slot.data).into_owned())
    }

    async fn rotate_version(&self, key: &str) -> Result<String> {
        let token = new_version_token();
        self.store.insert(
            key.to_string(),
            StoredBytes::new(token.clone().into_bytes(), None),
        );
        debug!("InMemory ROTATE {}", key);
        Ok(token)
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.clear();
        warn!("InMemory CLEAR_ALL executed - all cache cleared!");
        Ok(())
    }
}

/// Cache statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}
