//! Write-side observers.
//!
//! A [`ModelObserver`] runs after a content write is committed. The
//! [`CacheObserver`] turns every event into a tag flush followed by a guest
//! page flush; both steps complete before the observer returns, so the next
//! read after a write never sees pre-write data.

use crate::backend::CacheBackend;
use crate::entity::{CacheTagged, SoftDeletes};
use crate::error::Result;
use crate::events::{Lifecycle, ModelEvent};
use crate::service::CacheService;
use crate::tags::{EntityId, EntityKind, TagSet};
use std::sync::Arc;

/// Reacts to committed model writes.
#[allow(async_fn_in_trait)]
pub trait ModelObserver: Send + Sync {
    /// # Errors
    /// An error is reported to the writer; the write itself stays committed.
    async fn observe(&self, event: &ModelEvent) -> Result<()>;
}

impl<O: ModelObserver> ModelObserver for Arc<O> {
    async fn observe(&self, event: &ModelEvent) -> Result<()> {
        (**self).observe(event).await
    }
}

/// Runs both observers in order. Both always run; the first error wins.
impl<A: ModelObserver, B: ModelObserver> ModelObserver for (A, B) {
    async fn observe(&self, event: &ModelEvent) -> Result<()> {
        let first = self.0.observe(event).await;
        let second = self.1.observe(event).await;
        first.and(second)
    }
}

/// Flushes cache tags and guest pages for every model write.
#[derive(Clone)]
pub struct CacheObserver<B: CacheBackend> {
    cache: CacheService<B>,
}

impl<B: CacheBackend> CacheObserver<B> {
    pub fn new(cache: CacheService<B>) -> Self {
        CacheObserver { cache }
    }

    pub fn cache(&self) -> &CacheService<B> {
        &self.cache
    }

    /// # Errors
    /// Returns `Err` if either flush fails.
    pub async fn saved<E: CacheTagged>(&self, entity: &E) -> Result<()> {
        self.invalidate(Lifecycle::Saved, E::KIND, entity.id(), entity.cache_tags())
            .await
    }

    /// # Errors
    /// Returns `Err` if either flush fails.
    pub async fn deleted<E: CacheTagged>(&self, entity: &E) -> Result<()> {
        self.invalidate(Lifecycle::Deleted, E::KIND, entity.id(), entity.cache_tags())
            .await
    }

    /// # Errors
    /// Returns `Err` if either flush fails.
    pub async fn restored<E: SoftDeletes>(&self, entity: &E) -> Result<()> {
        self.invalidate(Lifecycle::Restored, E::KIND, entity.id(), entity.cache_tags())
            .await
    }

    async fn invalidate(
        &self,
        lifecycle: Lifecycle,
        kind: EntityKind,
        id: EntityId,
        tags: TagSet,
    ) -> Result<()> {
        debug!("» {} #{} {}: flushing [{}]", kind, id, lifecycle, tags);

        if let Err(e) = self.cache.flush_tags(&tags).await {
            error!("✗ Tag flush failed after {} #{} {}: {}", kind, id, lifecycle, e);
            return Err(e);
        }
        if let Err(e) = self.cache.flush_guest_pages().await {
            error!(
                "✗ Guest page flush failed after {} #{} {}: {}",
                kind, id, lifecycle, e
            );
            return Err(e);
        }
        Ok(())
    }
}

impl<B: CacheBackend> ModelObserver for CacheObserver<B> {
    async fn observe(&self, event: &ModelEvent) -> Result<()> {
        let entity = event.entity();
        self.invalidate(
            event.lifecycle(),
            entity.kind(),
            entity.id(),
            event.affected_tags(),
        )
        .await
    }
}
