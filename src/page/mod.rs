//! Guest page cache.
//!
//! Whole rendered responses for anonymous visitors, keyed by request URI.
//! Pages live in one region guarded by a generation token, so
//! [`GuestPageCache::flush`] drops every page at once without scanning keys.
//! Any content write flushes the region: pages embed too many fragments to
//! track per tag.

#[cfg(feature = "axum")]
pub mod middleware;

#[cfg(feature = "axum")]
pub use middleware::guest_page_layer;

use crate::backend::CacheBackend;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::key::CacheKeys;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Response header reporting whether a page came from the cache.
pub const CACHE_HEADER: &str = "x-cache";

/// Result of a guest page lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    Hit,
    Miss,
}

impl PageOutcome {
    /// Header value (`HIT` / `MISS`).
    pub fn as_str(self) -> &'static str {
        match self {
            PageOutcome::Hit => "HIT",
            PageOutcome::Miss => "MISS",
        }
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered response as stored in the page region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPage {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedPage {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        CachedPage {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Clone, Debug)]
struct PageSettings {
    enabled: bool,
    ttl: Option<Duration>,
    max_bytes: usize,
    session_cookie: String,
}

impl From<&CacheConfig> for PageSettings {
    fn from(config: &CacheConfig) -> Self {
        PageSettings {
            enabled: config.guest_pages_enabled,
            ttl: config.page_ttl(),
            max_bytes: config.max_page_bytes,
            session_cookie: config.session_cookie.clone(),
        }
    }
}

/// Full-page cache for guest requests.
#[derive(Clone)]
pub struct GuestPageCache<B: CacheBackend> {
    backend: B,
    keys: CacheKeys,
    settings: PageSettings,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> GuestPageCache<B> {
    pub fn new(backend: B, config: &CacheConfig) -> Self {
        GuestPageCache {
            backend,
            keys: CacheKeys::new(config.prefix.clone()),
            settings: PageSettings::from(config),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn session_cookie(&self) -> &str {
        &self.settings.session_cookie
    }

    pub fn max_page_bytes(&self) -> usize {
        self.settings.max_bytes
    }

    /// Only successful pages within the size limit are stored.
    pub fn is_cacheable(&self, page: &CachedPage) -> bool {
        page.status == 200 && page.body.len() <= self.settings.max_bytes
    }

    /// Cached page for `uri` in the current region.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    pub async fn get(&self, uri: &str) -> Result<Option<CachedPage>> {
        let (_, page) = self.lookup(uri).await?;
        Ok(page)
    }

    /// Resolve the page key for `uri` in the current region and read it.
    ///
    /// A render that follows a miss must be stored with [`put_at`] under the
    /// returned key. The key pins the region as it was before rendering, so a
    /// flush that lands mid-render leaves the new page unreachable.
    ///
    /// [`put_at`]: GuestPageCache::put_at
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    pub async fn lookup(&self, uri: &str) -> Result<(String, Option<CachedPage>)> {
        let key = self.page_key(uri).await?;
        let page = match self.backend.get(&key).await? {
            Some(bytes) => match deserialize_from_cache::<CachedPage>(&bytes) {
                Ok(page) => Some(page),
                Err(e) if e.is_stale_entry() => {
                    warn!("Evicting unreadable guest page {}: {}", uri, e);
                    self.backend.delete(&key).await?;
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let outcome = if page.is_some() {
            PageOutcome::Hit
        } else {
            PageOutcome::Miss
        };
        self.metrics.record_page(uri, outcome);
        Ok((key, page))
    }

    /// Store `page` for `uri` in the current region. Pages that are not
    /// cacheable are skipped.
    ///
    /// # Errors
    /// Returns `Err` if serialization fails or the backend is unreachable.
    pub async fn put(&self, uri: &str, page: &CachedPage) -> Result<()> {
        let key = self.page_key(uri).await?;
        self.put_at(&key, page).await
    }

    /// Store `page` under a key returned by [`GuestPageCache::lookup`].
    ///
    /// # Errors
    /// Returns `Err` if serialization fails or the backend is unreachable.
    pub async fn put_at(&self, key: &str, page: &CachedPage) -> Result<()> {
        if !self.is_cacheable(page) {
            debug!(
                "Not caching guest page {} (status {}, {} bytes)",
                key,
                page.status,
                page.body.len()
            );
            return Ok(());
        }
        let bytes = serialize_for_cache(page)?;
        self.backend.set(key, bytes, self.settings.ttl).await
    }

    /// Serve `uri` from the cache, or render, store, and serve it.
    ///
    /// # Errors
    /// Returns the renderer's error, or `Err` on backend failure.
    pub async fn fetch_or_render<F, Fut>(
        &self,
        uri: &str,
        render: F,
    ) -> Result<(CachedPage, PageOutcome)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedPage>>,
    {
        if !self.settings.enabled {
            return Ok((render().await?, PageOutcome::Miss));
        }

        let (key, cached) = self.lookup(uri).await?;
        if let Some(page) = cached {
            return Ok((page, PageOutcome::Hit));
        }

        let page = render().await?;
        self.put_at(&key, &page).await?;
        Ok((page, PageOutcome::Miss))
    }

    /// Drop every cached guest page.
    ///
    /// Rotates the region token; old pages become unreachable and age out
    /// through their TTL.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable.
    pub async fn flush(&self) -> Result<()> {
        self.backend
            .rotate_version(&self.keys.page_generation())
            .await?;
        self.metrics.record_page_flush();
        debug!("✓ Flushed guest page region");
        Ok(())
    }

    async fn page_key(&self, uri: &str) -> Result<String> {
        let generation = self.backend.version(&self.keys.page_generation()).await?;
        Ok(self.keys.page(&generation, uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::error::Error;

    fn pages() -> GuestPageCache<InMemoryBackend> {
        GuestPageCache::new(InMemoryBackend::new(), &CacheConfig::default())
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let pages = pages();

        let (page, outcome) = pages
            .fetch_or_render("/", || async { Ok(CachedPage::ok("<h1>Home</h1>")) })
            .await
            .unwrap();
        assert_eq!(outcome, PageOutcome::Miss);
        assert_eq!(page.body, b"<h1>Home</h1>");

        let (page, outcome) = pages
            .fetch_or_render("/", || async { Ok(CachedPage::ok("rerendered")) })
            .await
            .unwrap();
        assert_eq!(outcome, PageOutcome::Hit);
        assert_eq!(page.body, b"<h1>Home</h1>");
    }

    #[tokio::test]
    async fn test_flush_drops_every_page() {
        let pages = pages();
        pages.put("/", &CachedPage::ok("home")).await.unwrap();
        pages.put("/mods", &CachedPage::ok("mods")).await.unwrap();

        pages.flush().await.unwrap();

        assert_eq!(pages.get("/").await.unwrap(), None);
        assert_eq!(pages.get("/mods").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_ok_and_oversized_pages_not_stored() {
        let config = CacheConfig {
            max_page_bytes: 4,
            ..CacheConfig::default()
        };
        let pages = GuestPageCache::new(InMemoryBackend::new(), &config);

        let not_found = CachedPage {
            status: 404,
            headers: Vec::new(),
            body: b"gone".to_vec(),
        };
        pages.put("/missing", &not_found).await.unwrap();
        pages.put("/big", &CachedPage::ok("too large")).await.unwrap();

        assert_eq!(pages.get("/missing").await.unwrap(), None);
        assert_eq!(pages.get("/big").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_renders() {
        let config = CacheConfig {
            guest_pages_enabled: false,
            ..CacheConfig::default()
        };
        let pages = GuestPageCache::new(InMemoryBackend::new(), &config);

        for _ in 0..2 {
            let (_, outcome) = pages
                .fetch_or_render("/", || async { Ok(CachedPage::ok("x")) })
                .await
                .unwrap();
            assert_eq!(outcome, PageOutcome::Miss);
        }
    }

    #[tokio::test]
    async fn test_render_error_propagates() {
        let pages = pages();
        let result = pages
            .fetch_or_render("/", || async {
                Err(Error::ProducerError("template error".into()))
            })
            .await;
        assert!(matches!(result, Err(Error::ProducerError(_))));
        assert_eq!(pages.get("/").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_flush_during_render_keeps_next_request_a_miss() {
        let pages = pages();

        let flusher = pages.clone();
        let (page, outcome) = pages
            .fetch_or_render("/", || async move {
                // A write commits while the old content is being rendered.
                flusher.flush().await?;
                Ok(CachedPage::ok("old"))
            })
            .await
            .unwrap();
        assert_eq!(outcome, PageOutcome::Miss);
        assert_eq!(page.body, b"old");

        let (page, outcome) = pages
            .fetch_or_render("/", || async { Ok(CachedPage::ok("new")) })
            .await
            .unwrap();
        assert_eq!(outcome, PageOutcome::Miss);
        assert_eq!(page.body, b"new");
    }

    #[tokio::test]
    async fn test_put_at_lookup_key_round_trip() {
        let pages = pages();
        let (key, page) = pages.lookup("/news").await.unwrap();
        assert!(page.is_none());

        pages.put_at(&key, &CachedPage::ok("news")).await.unwrap();
        assert_eq!(pages.get("/news").await.unwrap(), Some(CachedPage::ok("news")));
    }

    #[test]
    fn test_outcome_header_values() {
        assert_eq!(PageOutcome::Hit.to_string(), "HIT");
        assert_eq!(PageOutcome::Miss.as_str(), "MISS");
    }
}
