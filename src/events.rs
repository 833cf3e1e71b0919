//! Model lifecycle events.

use crate::entity::SoftDeletes;
use crate::model::Entity;
use crate::tags::{EntityKind, TagSet};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Created or updated.
    Saved,
    /// Removed, softly or for good.
    Deleted,
    /// Brought back from soft delete.
    Restored,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Saved => "saved",
            Lifecycle::Deleted => "deleted",
            Lifecycle::Restored => "restored",
        };
        f.write_str(name)
    }
}

/// A committed write to a content model.
///
/// `Restored` events can only be built for [`SoftDeletes`] models. An update
/// may carry the row it replaced, so relations the write moved away from are
/// flushed too.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelEvent {
    lifecycle: Lifecycle,
    entity: Entity,
    previous: Option<Entity>,
}

impl ModelEvent {
    pub fn saved(entity: impl Into<Entity>) -> Self {
        ModelEvent {
            lifecycle: Lifecycle::Saved,
            entity: entity.into(),
            previous: None,
        }
    }

    pub fn deleted(entity: impl Into<Entity>) -> Self {
        ModelEvent {
            lifecycle: Lifecycle::Deleted,
            entity: entity.into(),
            previous: None,
        }
    }

    pub fn restored<E: SoftDeletes + Into<Entity>>(entity: E) -> Self {
        ModelEvent {
            lifecycle: Lifecycle::Restored,
            entity: entity.into(),
            previous: None,
        }
    }

    /// Attach the row this write replaced. Ignored unless it is the same
    /// kind and id as the written row.
    pub fn with_previous(mut self, previous: impl Into<Entity>) -> Self {
        let previous = previous.into();
        if previous.kind() == self.entity.kind() && previous.id() == self.entity.id() {
            self.previous = Some(previous);
        }
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn previous(&self) -> Option<&Entity> {
        self.previous.as_ref()
    }

    pub fn kind(&self) -> EntityKind {
        self.entity.kind()
    }

    /// Tags to flush for this event: the row's tags, plus those of the row
    /// it replaced.
    pub fn affected_tags(&self) -> TagSet {
        match &self.previous {
            Some(previous) => self.entity.cache_tags().union(previous.cache_tags()),
            None => self.entity.cache_tags(),
        }
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} {}",
            self.entity.kind(),
            self.entity.id(),
            self.lifecycle
        )
    }
}
