//! Postcard encoding with a versioned envelope.
//!
//! Every value forge-cache writes to a backend (tagged entries, guest pages)
//! is wrapped the same way:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (varint) │POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "FRGC"              u32                postcard::to_allocvec(T)
//! ```
//!
//! A bad magic or an older schema version is reported as an error; the cache
//! service treats either as a miss and evicts the entry.
//!
//! ```rust
//! use forge_cache::serialization::{deserialize_from_cache, serialize_for_cache};
//!
//! # fn main() -> forge_cache::Result<()> {
//! let bytes = serialize_for_cache(&("mods:list", 3u32))?;
//! let (key, count): (String, u32) = deserialize_from_cache(&bytes)?;
//! assert_eq!(key, "mods:list");
//! assert_eq!(count, 3);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for forge-cache entries.
pub const CACHE_MAGIC: [u8; 4] = *b"FRGC";

/// Current schema version.
///
/// Bump when the layout of stored entries changes. Entries written under an
/// older version are evicted on read.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around every stored payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    /// Magic header: must be b"FRGC"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    /// The stored data
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    /// Wrap a payload with the current magic and version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Serialize a value with envelope for cache storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = CacheEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        log::error!("Cache serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a value from cache storage, validating magic and version.
///
/// # Errors
///
/// - `Error::DeserializationError`: truncated or corrupted payload
/// - `Error::InvalidCacheEntry`: magic header mismatch
/// - `Error::VersionMismatch`: entry written by another schema version
pub fn deserialize_from_cache<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes)
        .map_err(|e| Error::DeserializationError(e.to_string()))?;

    if envelope.magic != CACHE_MAGIC {
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}
