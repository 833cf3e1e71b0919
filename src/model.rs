//! Content models of the mod platform and their cache tags.

use crate::entity::{CacheTagged, SoftDeletes};
use crate::tags::{EntityId, EntityKind, TagRegistry, TagSet};
use serde::{Deserialize, Serialize};

/// A published mod.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mod {
    pub id: EntityId,
    pub title: String,
    pub owner_id: Option<EntityId>,
    pub category_ids: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModCategory {
    pub id: EntityId,
    pub name: String,
    pub parent_id: Option<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModComment {
    pub id: EntityId,
    pub mod_id: Option<EntityId>,
    pub user_id: Option<EntityId>,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumThread {
    pub id: EntityId,
    pub forum_id: Option<EntityId>,
    pub user_id: Option<EntityId>,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: EntityId,
    pub user_id: Option<EntityId>,
    pub title: String,
}

impl CacheTagged for Mod {
    const KIND: EntityKind = EntityKind::Mod;

    fn id(&self) -> EntityId {
        self.id
    }

    /// Category pages list the mod; the owner's profile lists it too.
    fn cache_tags(&self) -> TagSet {
        TagRegistry::mods([self.id])
            .union(TagRegistry::categories(self.category_ids.iter().copied()))
            .union(TagRegistry::users(self.owner_id))
    }
}

impl CacheTagged for ModCategory {
    const KIND: EntityKind = EntityKind::ModCategory;

    fn id(&self) -> EntityId {
        self.id
    }

    /// A renamed category shows up on its parent and on every mod listing.
    fn cache_tags(&self) -> TagSet {
        let mut tags = TagRegistry::categories(std::iter::once(self.id).chain(self.parent_id));
        tags.insert("mods:all");
        tags
    }
}

impl CacheTagged for ModComment {
    const KIND: EntityKind = EntityKind::ModComment;

    fn id(&self) -> EntityId {
        self.id
    }

    fn cache_tags(&self) -> TagSet {
        TagRegistry::comments([self.id])
            .union(TagRegistry::mod_comments(self.mod_id))
            .union(TagRegistry::mods(self.mod_id))
            .union(TagRegistry::users(self.user_id))
    }
}

impl CacheTagged for ForumThread {
    const KIND: EntityKind = EntityKind::ForumThread;

    fn id(&self) -> EntityId {
        self.id
    }

    fn cache_tags(&self) -> TagSet {
        TagRegistry::threads([self.id])
            .union(TagRegistry::forums(self.forum_id))
            .union(TagRegistry::users(self.user_id))
    }
}

impl CacheTagged for NewsArticle {
    const KIND: EntityKind = EntityKind::NewsArticle;

    fn id(&self) -> EntityId {
        self.id
    }

    fn cache_tags(&self) -> TagSet {
        TagRegistry::news([self.id]).union(TagRegistry::users(self.user_id))
    }
}

impl SoftDeletes for Mod {}
impl SoftDeletes for ModComment {}
impl SoftDeletes for ForumThread {}

/// Any observed content model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Mod(Mod),
    ModCategory(ModCategory),
    ModComment(ModComment),
    ForumThread(ForumThread),
    NewsArticle(NewsArticle),
}

macro_rules! entity_variants {
    ($($variant:ident),+ $(,)?) => {
        impl Entity {
            pub fn kind(&self) -> EntityKind {
                match self {
                    $(Entity::$variant(_) => <$variant as CacheTagged>::KIND,)+
                }
            }

            pub fn id(&self) -> EntityId {
                match self {
                    $(Entity::$variant(e) => e.id(),)+
                }
            }

            pub fn cache_tags(&self) -> TagSet {
                match self {
                    $(Entity::$variant(e) => e.cache_tags(),)+
                }
            }
        }

        $(
            impl From<$variant> for Entity {
                fn from(entity: $variant) -> Self {
                    Entity::$variant(entity)
                }
            }

            impl TryFrom<Entity> for $variant {
                type Error = Entity;

                fn try_from(entity: Entity) -> std::result::Result<Self, Entity> {
                    match entity {
                        Entity::$variant(e) => Ok(e),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

entity_variants!(Mod, ModCategory, ModComment, ForumThread, NewsArticle);
