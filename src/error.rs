//! Error types for the cache and invalidation pipeline.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for forge-cache.
///
/// Backend failures are never swallowed on the invalidation path: a flush that
/// cannot reach the store surfaces as [`Error::BackendError`] so stale tagged
/// data is not served silently.
#[derive(Debug, Clone)]
pub enum Error {
    /// Serialization failed when converting a value to cache bytes.
    SerializationError(String),

    /// Deserialization failed when converting cache bytes back to a value.
    ///
    /// The service evicts such entries and recomputes them; this variant only
    /// escapes from the low-level serializer.
    DeserializationError(String),

    /// A key or configuration value was rejected before touching the store.
    ValidationError(String),

    /// Backend storage error (Redis unreachable, pool exhausted, ...).
    ///
    /// Propagated uncaught from `flush_tags` and `flush_guest_pages`.
    BackendError(String),

    /// The producer passed to `remember` failed. Nothing was stored.
    ProducerError(String),

    /// Configuration error while building the service or a backend.
    ConfigError(String),

    /// Feature not implemented by this backend or not enabled.
    NotImplemented(String),

    /// Invalid cache entry: corrupted envelope or bad magic.
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and cached data.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// True for errors caused by an unreadable stored entry.
    ///
    /// These are recoverable by evicting the entry and producing it again.
    pub fn is_stale_entry(&self) -> bool {
        matches!(
            self,
            Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::ProducerError(msg) => write!(f, "Producer error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => write!(
                f,
                "Cache version mismatch: expected {}, found {}",
                expected, found
            ),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}
