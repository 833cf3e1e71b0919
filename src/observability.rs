//! Metrics hooks and TTL policies.
//!
//! Implement [`CacheMetrics`] to feed hits, misses, writes, flushes, and guest
//! page outcomes into a monitoring system:
//!
//! ```ignore
//! use forge_cache::observability::CacheMetrics;
//! use forge_cache::page::PageOutcome;
//!
//! struct Prometheus;
//!
//! impl CacheMetrics for Prometheus {
//!     fn record_page(&self, _uri: &str, outcome: PageOutcome) {
//!         // counter!("guest_pages", "outcome" => outcome.as_str()).increment(1);
//!     }
//! }
//! ```
//!
//! The default methods log through the `log` crate; [`NoOpMetrics`] discards
//! everything and is what the service uses unless told otherwise.
//!
//! | Policy     | TTL used when `remember` gets `None`     |
//! |------------|------------------------------------------|
//! | `Infinite` | entry lives until a tag flush            |
//! | `Fixed`    | the same duration for every key          |
//! | `PerType`  | chosen from the key namespace (`mods`)   |

use crate::page::PageOutcome;
use crate::tags::Tag;
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// A tag version was rotated.
    fn record_flush(&self, tag: &Tag) {
        debug!("Cache FLUSH tag {}", tag);
    }

    /// The guest page region was rotated.
    fn record_page_flush(&self) {
        debug!("Cache FLUSH guest pages");
    }

    /// A guest page lookup finished.
    fn record_page(&self, uri: &str, outcome: PageOutcome) {
        debug!("Guest page {} -> {}", uri, outcome);
    }

    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_flush(&self, _tag: &Tag) {}
    fn record_page_flush(&self) {}
    fn record_page(&self, _uri: &str, _outcome: PageOutcome) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// TTL (Time-to-Live) policy for entries written without an explicit TTL.
#[derive(Clone, Debug, Default)]
pub enum TtlPolicy {
    /// No TTL; entries live until a tag flush evicts them.
    #[default]
    Infinite,

    /// Fixed duration for all entries.
    Fixed(Duration),

    /// Duration chosen from the key namespace.
    PerType(fn(&str) -> Duration),
}

impl TtlPolicy {
    /// TTL for a key namespace.
    pub fn get_ttl(&self, namespace: &str) -> Option<Duration> {
        match self {
            TtlPolicy::Infinite => None,
            TtlPolicy::Fixed(d) => Some(*d),
            TtlPolicy::PerType(f) => Some(f(namespace)),
        }
    }

    /// Resolve an explicit TTL, falling back to the policy.
    pub fn resolve(&self, explicit: Option<Duration>, namespace: &str) -> Option<Duration> {
        explicit.or_else(|| self.get_ttl(namespace))
    }
}
