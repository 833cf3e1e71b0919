//! Traits implemented by cache-tagged domain models.

use crate::tags::{EntityId, EntityKind, TagSet};

/// A domain model whose writes invalidate cached data.
///
/// # Example
///
/// ```
/// use forge_cache::entity::CacheTagged;
/// use forge_cache::tags::{EntityId, EntityKind, TagRegistry, TagSet};
///
/// struct NewsArticle {
///     id: EntityId,
///     author_id: Option<EntityId>,
/// }
///
/// impl CacheTagged for NewsArticle {
///     const KIND: EntityKind = EntityKind::NewsArticle;
///
///     fn id(&self) -> EntityId {
///         self.id
///     }
///
///     fn cache_tags(&self) -> TagSet {
///         TagRegistry::news([self.id]).union(TagRegistry::users(self.author_id))
///     }
/// }
///
/// let article = NewsArticle { id: 5, author_id: Some(2) };
/// assert!(article.cache_tags().contains("news:5"));
/// assert!(article.cache_tags().contains("user:2"));
/// ```
pub trait CacheTagged: Send + Sync {
    const KIND: EntityKind;

    fn id(&self) -> EntityId;

    /// Every tag a write to this entity must flush: its own identity and
    /// aggregate tags plus the tags of related objects whose cached views
    /// embed it.
    fn cache_tags(&self) -> TagSet;
}

/// Models with soft delete. Only these can be restored.
pub trait SoftDeletes: CacheTagged {}
