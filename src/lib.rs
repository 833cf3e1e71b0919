//! # forge-cache
//!
//! Tag-based cache invalidation for a community mod hub.
//!
//! ## Features
//!
//! - **Tagged entries:** `remember` stores computed values under cache tags
//!   such as `mod:42` or `home`
//! - **Write-driven invalidation:** model observers flush the tags of every
//!   saved, deleted, or restored mod, category, comment, thread, and article
//! - **Guest page cache:** whole pages for anonymous visitors, flushed on any
//!   content write, with an `X-Cache: HIT|MISS` header (axum middleware)
//! - **Backend agnostic:** in-memory store for single nodes and tests, Redis
//!   for shared deployments
//!
//! ## Quick Start
//!
//! ```ignore
//! use forge_cache::{
//!     backend::InMemoryBackend, model::Mod, CacheObserver, CacheService,
//!     ContentRepository, TagRegistry,
//! };
//!
//! let cache = CacheService::new(InMemoryBackend::new());
//! let repo = ContentRepository::new(CacheObserver::new(cache.clone()));
//!
//! // Read path: compute once, reuse until mod 42 changes.
//! let title: String = cache
//!     .remember("mod:42:title", None, &TagRegistry::mods([42]), || async {
//!         Ok(load_title(42).await?)
//!     })
//!     .await?;
//!
//! // Write path: the observer flushes mod:42, mods:all, home, and guest pages.
//! repo.save(Mod { id: 42, title: "Renamed".into(), owner_id: None, category_ids: vec![] })
//!     .await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod key;
pub mod model;
pub mod observability;
pub mod observer;
pub mod page;
pub mod repository;
pub mod serialization;
pub mod service;
pub mod tagged;
pub mod tags;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use config::CacheConfig;
pub use entity::{CacheTagged, SoftDeletes};
pub use error::{Error, Result};
pub use events::{Lifecycle, ModelEvent};
pub use observer::{CacheObserver, ModelObserver};
pub use page::{CachedPage, GuestPageCache, PageOutcome};
pub use repository::ContentRepository;
pub use service::CacheService;
pub use tags::{EntityId, EntityKind, Tag, TagRegistry, TagSet};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
