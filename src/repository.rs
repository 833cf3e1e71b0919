//! In-memory content store that fires model events.
//!
//! Every write commits first, then notifies the observer. An observer error is
//! returned to the caller but the write is not rolled back: the content is
//! stored, and the caller learns that caches may still be serving old data.
//!
//! ```ignore
//! let cache = CacheService::new(InMemoryBackend::new());
//! let repo = ContentRepository::new(CacheObserver::new(cache.clone()));
//!
//! let m = repo.save(Mod { id: repo.next_id(), .. }).await?;
//! repo.delete::<Mod>(m.id).await?;
//! repo.restore::<Mod>(m.id).await?;
//! ```

use crate::entity::{CacheTagged, SoftDeletes};
use crate::error::Result;
use crate::events::ModelEvent;
use crate::model::{Entity, Mod};
use crate::observer::ModelObserver;
use crate::tags::{EntityId, EntityKind};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

type RowKey = (EntityKind, EntityId);

/// Content tables for every observed model.
pub struct ContentRepository<O: ModelObserver> {
    live: DashMap<RowKey, Entity>,
    trashed: DashMap<RowKey, Entity>,
    next_id: AtomicU64,
    observer: O,
}

impl<O: ModelObserver> ContentRepository<O> {
    pub fn new(observer: O) -> Self {
        ContentRepository {
            live: DashMap::new(),
            trashed: DashMap::new(),
            next_id: AtomicU64::new(1),
            observer,
        }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Allocate an id for a new row.
    pub fn next_id(&self) -> EntityId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert or update a row.
    ///
    /// An update flushes the replaced row's tags as well, so listings of a
    /// former owner or parent drop it. Saving over a trashed row discards the
    /// trashed copy.
    ///
    /// # Errors
    /// Returns the observer's error; the row stays saved.
    pub async fn save<E>(&self, entity: E) -> Result<E>
    where
        E: CacheTagged + Clone + Into<Entity>,
    {
        let key = (E::KIND, entity.id());
        let row: Entity = entity.clone().into();
        let previous = self.live.insert(key, row.clone());
        self.trashed.remove(&key);
        debug!("Saved {} #{}", E::KIND, entity.id());

        let event = match previous {
            Some(previous) => ModelEvent::saved(row).with_previous(previous),
            None => ModelEvent::saved(row),
        };
        self.notify(event).await?;
        Ok(entity)
    }

    /// Live row by id.
    pub fn find<E>(&self, id: EntityId) -> Option<E>
    where
        E: CacheTagged + TryFrom<Entity>,
    {
        let row = self.live.get(&(E::KIND, id))?.value().clone();
        E::try_from(row).ok()
    }

    /// Delete a row. Soft-deleting kinds move to the trash and can be
    /// restored; others are gone for good. Deleting a missing row is a no-op
    /// and fires nothing.
    ///
    /// # Errors
    /// Returns the observer's error; the row stays deleted.
    pub async fn delete<E>(&self, id: EntityId) -> Result<Option<E>>
    where
        E: CacheTagged + TryFrom<Entity>,
    {
        let key = (E::KIND, id);
        let Some((_, row)) = self.live.remove(&key) else {
            return Ok(None);
        };
        if E::KIND.soft_deletes() {
            self.trashed.insert(key, row.clone());
        }
        debug!("Deleted {} #{}", E::KIND, id);

        self.notify(ModelEvent::deleted(row.clone())).await?;
        Ok(E::try_from(row).ok())
    }

    /// Bring a soft-deleted row back. Returns `None` when nothing is trashed
    /// under `id` or a live row already holds it.
    ///
    /// # Errors
    /// Returns the observer's error; the row stays restored.
    pub async fn restore<E>(&self, id: EntityId) -> Result<Option<E>>
    where
        E: SoftDeletes + TryFrom<Entity> + Into<Entity> + Clone,
    {
        let key = (E::KIND, id);
        if self.live.contains_key(&key) {
            return Ok(None);
        }
        let Some((_, row)) = self.trashed.remove(&key) else {
            return Ok(None);
        };
        let Ok(entity) = E::try_from(row) else {
            return Ok(None);
        };
        self.live.insert(key, entity.clone().into());
        debug!("Restored {} #{}", E::KIND, id);

        self.notify(ModelEvent::restored(entity.clone())).await?;
        Ok(Some(entity))
    }

    pub fn is_trashed(&self, kind: EntityKind, id: EntityId) -> bool {
        self.trashed.contains_key(&(kind, id))
    }

    /// Link a mod to a category. Fires a `saved` event for the mod.
    ///
    /// Returns `None` when the mod does not exist.
    ///
    /// # Errors
    /// Returns the observer's error; the link stays in place.
    pub async fn attach_category(
        &self,
        mod_id: EntityId,
        category_id: EntityId,
    ) -> Result<Option<Mod>> {
        let Some(mut m) = self.find::<Mod>(mod_id) else {
            return Ok(None);
        };
        if !m.category_ids.contains(&category_id) {
            m.category_ids.push(category_id);
        }
        self.save(m).await.map(Some)
    }

    /// Unlink a mod from a category. Fires a `saved` event carrying the
    /// pre-detach row, so the category's listings drop the mod.
    ///
    /// # Errors
    /// Returns the observer's error; the link stays removed.
    pub async fn detach_category(
        &self,
        mod_id: EntityId,
        category_id: EntityId,
    ) -> Result<Option<Mod>> {
        let Some(mut m) = self.find::<Mod>(mod_id) else {
            return Ok(None);
        };
        let before = m.clone();
        m.category_ids.retain(|id| *id != category_id);

        let row: Entity = m.clone().into();
        self.live.insert((EntityKind::Mod, mod_id), row.clone());

        self.notify(ModelEvent::saved(row).with_previous(before)).await?;
        Ok(Some(m))
    }

    async fn notify(&self, event: ModelEvent) -> Result<()> {
        if let Err(e) = self.observer.observe(&event).await {
            warn!("Write kept but observer failed for {}: {}", event, e);
            return Err(e);
        }
        Ok(())
    }
}
