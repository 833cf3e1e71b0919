//! Backend key layout.
//!
//! Every key the crate writes lives under one configurable prefix:
//!
//! ```text
//! {prefix}:entry:{key}               tagged entries written by `remember`/`put`
//! {prefix}:tag:{tag}                 version token of one tag
//! {prefix}:pages:generation          version token of the guest page region
//! {prefix}:pages:{generation}:{uri}  one cached guest page
//! ```

use crate::error::{Error, Result};
use crate::tags::Tag;

/// Longest logical key accepted by [`CacheKeys::entry`].
pub const MAX_KEY_LEN: usize = 250;

/// Builder for namespaced backend keys.
#[derive(Clone, Debug)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        CacheKeys {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Backend key for a logical cache key.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` for empty, oversized, or control
    /// character keys.
    pub fn entry(&self, key: &str) -> Result<String> {
        validate(key)?;
        Ok(Self::compose(&[&self.prefix, "entry", key]))
    }

    /// Backend key holding the version token of `tag`.
    pub fn tag_version(&self, tag: &Tag) -> String {
        Self::compose(&[&self.prefix, "tag", tag.as_str()])
    }

    /// Backend key holding the guest page region token.
    pub fn page_generation(&self) -> String {
        Self::compose(&[&self.prefix, "pages", "generation"])
    }

    /// Backend key of one guest page under a given region token.
    pub fn page(&self, generation: &str, uri: &str) -> String {
        Self::compose(&[&self.prefix, "pages", generation, uri])
    }

    /// Join key parts with `:`.
    pub fn compose(parts: &[&str]) -> String {
        parts.join(":")
    }

    /// First `:`-separated segment of a logical key (`mods` in `mods:list`).
    pub fn namespace_of(key: &str) -> &str {
        key.split(':').next().unwrap_or(key)
    }
}

fn validate(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::ValidationError(
            "Cache key cannot be empty".to_string(),
        ));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::ValidationError(format!(
            "Cache key too long ({} > {} bytes)",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(Error::ValidationError(
            "Cache key contains control characters".to_string(),
        ));
    }
    Ok(())
}
