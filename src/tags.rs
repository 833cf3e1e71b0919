//! Cache tags and the tag registry.
//!
//! A [`Tag`] is an opaque label grouping cache entries that depend on the same
//! domain object. [`TagRegistry`] maps entity identity to tags. It is pure:
//! the same input always yields the same [`TagSet`], ids may come as a single
//! value, a collection, or an `Option` (a missing relation contributes
//! nothing), and duplicates collapse.
//!
//! ```
//! use forge_cache::tags::{EntityKind, TagRegistry};
//!
//! let tags = TagRegistry::tags_for(EntityKind::Mod, [42]);
//! assert!(tags.contains("mod:42"));
//! assert!(tags.contains("mods:all"));
//! assert!(tags.contains("home"));
//!
//! // Absent relation: no tags at all.
//! assert!(TagRegistry::tags_for(EntityKind::User, None).is_empty());
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

/// Identifier type shared by every cacheable entity.
pub type EntityId = u64;

/// Site-wide home feed tag.
pub const HOME: &str = "home";

/// A single cache tag.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Tag(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Tag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Tag::new(s)
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Tag(s)
    }
}

/// Ordered, duplicate-free set of tags.
///
/// Ordering makes stored tag stamps and log lines deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<Tag>) -> bool {
        self.0.insert(tag.into())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Tag> {
        self.0.iter()
    }

    /// Union in place.
    pub fn extend_from(&mut self, other: TagSet) {
        self.0.extend(other.0);
    }

    /// Union by value, for chaining.
    pub fn union(mut self, other: TagSet) -> TagSet {
        self.extend_from(other);
        self
    }

    pub fn is_subset(&self, other: &TagSet) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl<T: Into<Tag>> FromIterator<T> for TagSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        TagSet(iter.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Tag>> Extend<T> for TagSet {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for TagSet {
    type Item = Tag;
    type IntoIter = btree_set::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = btree_set::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for tag in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(tag.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// Kinds of objects that own cache tags.
///
/// The five content kinds have observers; `User` and `Forum` only appear as
/// related aggregates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Mod,
    ModCategory,
    ModComment,
    ForumThread,
    NewsArticle,
    Forum,
    User,
}

impl EntityKind {
    /// Prefix of the per-id tag (`mod` in `mod:42`).
    pub fn tag_prefix(self) -> &'static str {
        match self {
            EntityKind::Mod => "mod",
            EntityKind::ModCategory => "category",
            EntityKind::ModComment => "comment",
            EntityKind::ForumThread => "thread",
            EntityKind::NewsArticle => "news",
            EntityKind::Forum => "forum",
            EntityKind::User => "user",
        }
    }

    /// Tags for listings that aggregate every entity of this kind.
    pub fn aggregate_tags(self) -> &'static [&'static str] {
        match self {
            EntityKind::Mod => &["mods:all", HOME],
            EntityKind::ModCategory => &["categories:all", HOME],
            EntityKind::ForumThread => &["threads:all"],
            EntityKind::NewsArticle => &["news:all", HOME],
            EntityKind::ModComment | EntityKind::Forum | EntityKind::User => &[],
        }
    }

    /// Whether the kind supports soft delete and therefore `restored` events.
    pub fn soft_deletes(self) -> bool {
        matches!(
            self,
            EntityKind::Mod | EntityKind::ModComment | EntityKind::ForumThread
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Mod => "Mod",
            EntityKind::ModCategory => "ModCategory",
            EntityKind::ModComment => "ModComment",
            EntityKind::ForumThread => "ForumThread",
            EntityKind::NewsArticle => "NewsArticle",
            EntityKind::Forum => "Forum",
            EntityKind::User => "User",
        };
        f.write_str(name)
    }
}

/// Pure mapping from entity identity to cache tags.
pub struct TagRegistry;

impl TagRegistry {
    /// Identity tag for one entity (`mod:42`).
    pub fn identity(kind: EntityKind, id: EntityId) -> Tag {
        Tag(format!("{}:{}", kind.tag_prefix(), id))
    }

    /// Tags for one or more entities of `kind`.
    ///
    /// Yields every identity tag plus the kind's aggregate tags. With no ids,
    /// the result is empty.
    pub fn tags_for<I>(kind: EntityKind, ids: I) -> TagSet
    where
        I: IntoIterator<Item = EntityId>,
    {
        let mut tags: TagSet = ids
            .into_iter()
            .map(|id| Self::identity(kind, id))
            .collect();
        if !tags.is_empty() {
            tags.extend(kind.aggregate_tags().iter().copied());
        }
        tags
    }

    pub fn mods<I: IntoIterator<Item = EntityId>>(ids: I) -> TagSet {
        Self::tags_for(EntityKind::Mod, ids)
    }

    pub fn categories<I: IntoIterator<Item = EntityId>>(ids: I) -> TagSet {
        Self::tags_for(EntityKind::ModCategory, ids)
    }

    pub fn comments<I: IntoIterator<Item = EntityId>>(ids: I) -> TagSet {
        Self::tags_for(EntityKind::ModComment, ids)
    }

    pub fn threads<I: IntoIterator<Item = EntityId>>(ids: I) -> TagSet {
        Self::tags_for(EntityKind::ForumThread, ids)
    }

    pub fn forums<I: IntoIterator<Item = EntityId>>(ids: I) -> TagSet {
        Self::tags_for(EntityKind::Forum, ids)
    }

    pub fn news<I: IntoIterator<Item = EntityId>>(ids: I) -> TagSet {
        Self::tags_for(EntityKind::NewsArticle, ids)
    }

    pub fn users<I: IntoIterator<Item = EntityId>>(ids: I) -> TagSet {
        Self::tags_for(EntityKind::User, ids)
    }

    /// Comment listing tags of the given mods (`mod:42:comments`).
    pub fn mod_comments<I: IntoIterator<Item = EntityId>>(mod_ids: I) -> TagSet {
        mod_ids
            .into_iter()
            .map(|id| format!("mod:{}:comments", id))
            .collect()
    }

    pub fn home() -> TagSet {
        std::iter::once(HOME).collect()
    }
}
