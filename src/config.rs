//! Cache configuration.
//!
//! Built in code, deserialized from the host application's settings file, or
//! read from the environment:
//!
//! | Variable                        | Field                 | Default          |
//! |---------------------------------|-----------------------|------------------|
//! | `FORGE_CACHE_PREFIX`            | `prefix`              | `forge`          |
//! | `FORGE_CACHE_TTL_SECS`          | `default_ttl_secs`    | unset (forever)  |
//! | `FORGE_PAGE_CACHE_ENABLED`      | `guest_pages_enabled` | `true`           |
//! | `FORGE_PAGE_CACHE_TTL_SECS`     | `page_ttl_secs`       | `3600`           |
//! | `FORGE_PAGE_CACHE_MAX_BYTES`    | `max_page_bytes`      | `1048576`        |
//! | `FORGE_SESSION_COOKIE`          | `session_cookie`      | `forge_session`  |
//! | `REDIS_URL`                     | `redis_url`           | unset            |
//! | `REDIS_POOL_SIZE`               | `redis_pool_size`     | `16`             |

use crate::error::{Error, Result};
use crate::observability::TtlPolicy;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PREFIX: &str = "forge";
const DEFAULT_PAGE_TTL_SECS: u64 = 3600;
const DEFAULT_MAX_PAGE_BYTES: usize = 1024 * 1024;
const DEFAULT_SESSION_COOKIE: &str = "forge_session";
const DEFAULT_REDIS_POOL_SIZE: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace for every backend key.
    pub prefix: String,
    /// TTL for `remember` calls that pass `None`. Unset means no expiry.
    pub default_ttl_secs: Option<u64>,
    /// Enable the guest page cache.
    pub guest_pages_enabled: bool,
    /// TTL of cached guest pages. Unset means no expiry.
    pub page_ttl_secs: Option<u64>,
    /// Responses with larger bodies are served but not cached.
    pub max_page_bytes: usize,
    /// Cookie whose presence marks a request as authenticated.
    pub session_cookie: String,
    pub redis_url: Option<String>,
    pub redis_pool_size: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl_secs: None,
            guest_pages_enabled: true,
            page_ttl_secs: Some(DEFAULT_PAGE_TTL_SECS),
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            redis_url: None,
            redis_pool_size: DEFAULT_REDIS_POOL_SIZE,
        }
    }
}

impl CacheConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` when a variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` when a variable is set but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(prefix) = lookup("FORGE_CACHE_PREFIX") {
            config.prefix = prefix;
        }
        if let Some(raw) = lookup("FORGE_CACHE_TTL_SECS") {
            config.default_ttl_secs = Some(parse("FORGE_CACHE_TTL_SECS", &raw)?);
        }
        if let Some(raw) = lookup("FORGE_PAGE_CACHE_ENABLED") {
            config.guest_pages_enabled = parse_bool("FORGE_PAGE_CACHE_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("FORGE_PAGE_CACHE_TTL_SECS") {
            config.page_ttl_secs = Some(parse("FORGE_PAGE_CACHE_TTL_SECS", &raw)?);
        }
        if let Some(raw) = lookup("FORGE_PAGE_CACHE_MAX_BYTES") {
            config.max_page_bytes = parse("FORGE_PAGE_CACHE_MAX_BYTES", &raw)?;
        }
        if let Some(cookie) = lookup("FORGE_SESSION_COOKIE") {
            config.session_cookie = cookie;
        }
        config.redis_url = lookup("REDIS_URL");
        if let Some(raw) = lookup("REDIS_POOL_SIZE") {
            config.redis_pool_size = parse("REDIS_POOL_SIZE", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `Error::ConfigError` for an empty prefix, a zero pool size, or
    /// a zero TTL. A zero TTL would store entries that are already expired;
    /// leave the TTL unset for no expiry, or disable the page cache instead.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() || self.prefix.contains(':') {
            return Err(Error::ConfigError(format!(
                "cache prefix must be non-empty and contain no ':' (got {:?})",
                self.prefix
            )));
        }
        for (name, ttl) in [
            ("default_ttl_secs", self.default_ttl_secs),
            ("page_ttl_secs", self.page_ttl_secs),
        ] {
            if ttl == Some(0) {
                return Err(Error::ConfigError(format!(
                    "{} must be at least 1 second, or unset for no expiry",
                    name
                )));
            }
        }
        if self.redis_pool_size == 0 {
            return Err(Error::ConfigError(
                "redis_pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }

    pub fn page_ttl(&self) -> Option<Duration> {
        self.page_ttl_secs.map(Duration::from_secs)
    }

    /// TTL policy for `remember` calls without an explicit TTL.
    pub fn ttl_policy(&self) -> TtlPolicy {
        match self.default_ttl() {
            Some(ttl) => TtlPolicy::Fixed(ttl),
            None => TtlPolicy::Infinite,
        }
    }
}

fn parse<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::ConfigError(format!("invalid {}={:?}: {}", name, raw, e)))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::ConfigError(format!(
            "invalid {}={:?}: expected a boolean",
            name, raw
        ))),
    }
}
