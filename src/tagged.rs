//! Tag-aware read-through cache.
//!
//! Each stored entry carries a stamp per tag: the tag's version token at the
//! time the entry was written. An entry is live only while every stamp still
//! matches the tag's current token, so flushing a tag is a single token
//! rotation no matter how many entries reference it.

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::key::CacheKeys;
use crate::observability::{CacheMetrics, NoOpMetrics, TtlPolicy};
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use crate::tags::{Tag, TagSet};
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct TagStamp {
    tag: Tag,
    version: String,
}

#[derive(Serialize)]
struct StoredEntryRef<'a, T> {
    stamps: &'a [TagStamp],
    value: &'a T,
}

#[derive(Deserialize)]
struct StoredEntry<T> {
    stamps: Vec<TagStamp>,
    value: T,
}

/// Tagged entry cache over a [`CacheBackend`].
///
/// Usually reached through [`CacheService`](crate::CacheService), which shares
/// one instance behind an `Arc`.
pub struct TaggedCache<B: CacheBackend> {
    backend: B,
    keys: CacheKeys,
    metrics: Arc<dyn CacheMetrics>,
    pub(crate) ttl_policy: TtlPolicy,
}

impl<B: CacheBackend> TaggedCache<B> {
    pub fn new(backend: B, keys: CacheKeys) -> Self {
        TaggedCache {
            backend,
            keys,
            metrics: Arc::new(NoOpMetrics),
            ttl_policy: TtlPolicy::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.ttl_policy = policy;
        self
    }

    /// Return the live value under `key`, or produce, store, and return it.
    ///
    /// Tag versions are read before `producer` runs. A flush that lands while
    /// the producer is working therefore leaves the new entry already stale.
    ///
    /// # Errors
    ///
    /// - `Error::ValidationError`: the key is empty or malformed
    /// - `Error::BackendError`: the store is unreachable
    /// - whatever `producer` returns; nothing is stored in that case
    pub async fn remember<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        tags: &TagSet,
        producer: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timer = Instant::now();
        let backend_key = self.keys.entry(key)?;

        match self.lookup::<T>(&backend_key).await {
            Ok(Some(value)) => {
                self.metrics.record_hit(key, timer.elapsed());
                return Ok(value);
            }
            Ok(None) => self.metrics.record_miss(key, timer.elapsed()),
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                return Err(e);
            }
        }

        let stamps = self.stamp(tags).await?;
        let value = producer().await?;
        let ttl = self.ttl_policy.resolve(ttl, CacheKeys::namespace_of(key));
        self.write(&backend_key, &stamps, &value, ttl).await?;
        self.metrics.record_set(key, timer.elapsed());

        debug!("» remember {} stored with tags [{}]", key, tags);
        Ok(value)
    }

    /// Live value under `key`, if any.
    ///
    /// # Errors
    /// Returns `Err` for invalid keys or backend failures.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let backend_key = self.keys.entry(key)?;
        self.lookup(&backend_key).await
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// # Errors
    /// Returns `Err` for invalid keys, serialization or backend failures.
    pub async fn put<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        tags: &TagSet,
    ) -> Result<()> {
        let timer = Instant::now();
        let backend_key = self.keys.entry(key)?;
        let stamps = self.stamp(tags).await?;
        let ttl = self.ttl_policy.resolve(ttl, CacheKeys::namespace_of(key));
        self.write(&backend_key, &stamps, value, ttl).await?;
        self.metrics.record_set(key, timer.elapsed());
        Ok(())
    }

    /// Remove the entry under `key`.
    ///
    /// # Errors
    /// Returns `Err` for invalid keys or backend failures.
    pub async fn forget(&self, key: &str) -> Result<()> {
        let backend_key = self.keys.entry(key)?;
        self.backend.delete(&backend_key).await
    }

    /// Invalidate every entry stamped with any of `tags`.
    ///
    /// Flushing an unused tag, or the same tag twice, is harmless.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if the store is unreachable. Tags rotated
    /// before the failure stay rotated.
    pub async fn flush_tags(&self, tags: &TagSet) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = tags.iter().map(|t| self.keys.tag_version(t)).collect();
        try_join_all(keys.iter().map(|k| self.backend.rotate_version(k))).await?;

        for tag in tags {
            self.metrics.record_flush(tag);
        }
        debug!("✓ Flushed tags [{}]", tags);
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// Current token of every tag, creating tokens for unseen tags.
    async fn stamp(&self, tags: &TagSet) -> Result<Vec<TagStamp>> {
        let keys: Vec<String> = tags.iter().map(|t| self.keys.tag_version(t)).collect();
        let versions = try_join_all(keys.iter().map(|k| self.backend.version(k))).await?;

        Ok(tags
            .iter()
            .cloned()
            .zip(versions)
            .map(|(tag, version)| TagStamp { tag, version })
            .collect())
    }

    async fn stamps_current(&self, stamps: &[TagStamp]) -> Result<bool> {
        for stamp in stamps {
            let current = self
                .backend
                .version(&self.keys.tag_version(&stamp.tag))
                .await?;
            if current != stamp.version {
                debug!("Tag {} flushed since write", stamp.tag);
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn lookup<T: DeserializeOwned>(&self, backend_key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.backend.get(backend_key).await? else {
            return Ok(None);
        };

        let entry: StoredEntry<T> = match deserialize_from_cache(&bytes) {
            Ok(entry) => entry,
            Err(e) if e.is_stale_entry() => {
                warn!("Evicting unreadable cache entry {}: {}", backend_key, e);
                self.backend.delete(backend_key).await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if self.stamps_current(&entry.stamps).await? {
            Ok(Some(entry.value))
        } else {
            self.backend.delete(backend_key).await?;
            Ok(None)
        }
    }

    async fn write<T: Serialize>(
        &self,
        backend_key: &str,
        stamps: &[TagStamp],
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let bytes = serialize_for_cache(&StoredEntryRef { stamps, value })?;
        self.backend.set(backend_key, bytes, ttl).await
    }
}
