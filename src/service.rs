//! High-level cache service.
//!
//! Bundles the tagged entry cache and the guest page cache over one backend.
//! Cloning is cheap: clones share the same entry cache through an `Arc`, so a
//! single service can sit in application state, observers, and middleware.

use crate::backend::CacheBackend;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::key::CacheKeys;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::page::GuestPageCache;
use crate::tagged::TaggedCache;
use crate::tags::TagSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Tag-aware cache facade.
///
/// # Example
///
/// ```ignore
/// use forge_cache::{CacheService, TagRegistry, backend::InMemoryBackend};
///
/// let cache = CacheService::new(InMemoryBackend::new());
///
/// let listing: Vec<ModSummary> = cache
///     .remember("mods:list", None, &TagRegistry::mods(ids.clone()), || async {
///         db.mod_listing().await.map_err(Into::into)
///     })
///     .await?;
/// ```
#[derive(Clone)]
pub struct CacheService<B: CacheBackend> {
    entries: Arc<TaggedCache<B>>,
    pages: GuestPageCache<B>,
}

impl<B: CacheBackend> CacheService<B> {
    /// Service with default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &CacheConfig::default())
    }

    pub fn with_config(backend: B, config: &CacheConfig) -> Self {
        Self::with_metrics(backend, config, Arc::new(NoOpMetrics))
    }

    /// Service reporting to custom metrics.
    pub fn with_metrics(
        backend: B,
        config: &CacheConfig,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Self {
        let entries = TaggedCache::new(backend.clone(), CacheKeys::new(config.prefix.clone()))
            .with_ttl_policy(config.ttl_policy())
            .with_metrics(metrics.clone());
        let pages = GuestPageCache::new(backend, config).with_metrics(metrics);

        CacheService {
            entries: Arc::new(entries),
            pages,
        }
    }

    /// Return the cached value under `key`, or compute it with `producer`.
    ///
    /// The stored value stays valid until its TTL expires or any tag in `tags`
    /// is flushed. A `None` TTL falls back to the configured default.
    ///
    /// # Errors
    ///
    /// - `Error::ValidationError`: empty or malformed key
    /// - `Error::BackendError`: cache store unavailable
    /// - `Error::SerializationError`: value cannot be encoded
    /// - any error returned by `producer`
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
        self.entries.remember(key, ttl, tags, producer).await
    }

    /// # Errors
    /// Returns `Err` for invalid keys or backend failures.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.entries.get(key).await
    }

    /// # Errors
    /// Returns `Err` for invalid keys, serialization or backend failures.
    pub async fn put<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        tags: &TagSet,
    ) -> Result<()> {
        self.entries.put(key, value, ttl, tags).await
    }

    /// # Errors
    /// Returns `Err` for invalid keys or backend failures.
    pub async fn forget(&self, key: &str) -> Result<()> {
        self.entries.forget(key).await
    }

    /// Invalidate every entry carrying any of `tags`.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if the cache store is unavailable.
    pub async fn flush_tags(&self, tags: &TagSet) -> Result<()> {
        self.entries.flush_tags(tags).await
    }

    /// Drop every cached guest page.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if the cache store is unavailable.
    pub async fn flush_guest_pages(&self) -> Result<()> {
        self.pages.flush().await
    }

    /// Guest page cache sharing this service's backend, for middleware state.
    pub fn pages(&self) -> &GuestPageCache<B> {
        &self.pages
    }

    pub fn entries(&self) -> &TaggedCache<B> {
        &self.entries
    }

    pub fn backend(&self) -> &B {
        self.entries.backend()
    }

    /// # Errors
    /// Returns `Err` if the backend is not reachable.
    pub async fn health_check(&self) -> Result<bool> {
        self.backend().health_check().await
    }
}
