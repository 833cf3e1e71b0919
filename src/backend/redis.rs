//! Redis cache backend.
//!
//! Lets several application nodes share one tag version table and page
//! region, so a flush on one node is seen by all of them.

use super::{new_version_token, CacheBackend};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use deadpool_redis::{redis::AsyncCommands, Config as PoolConfig, Connection, Pool, Runtime};
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

const DEFAULT_POOL_SIZE: u32 = 16;

/// Connection settings for [`RedisBackend`].
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl RedisConfig {
    pub fn connection_string(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => format!(
                "redis://{}:{}@{}:{}/{}",
                user, password, self.host, self.port, self.database
            ),
            (None, Some(password)) => format!(
                "redis://default:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// Pooled Redis backend.
///
/// Version tokens are created with `SET NX`, so concurrent first readers of a
/// tag agree on one token.
///
/// ```no_run
/// # use forge_cache::backend::{RedisBackend, CacheBackend};
/// # use forge_cache::config::CacheConfig;
/// # async fn example() -> forge_cache::Result<()> {
/// let config = CacheConfig::from_env()?;
/// let backend = RedisBackend::from_config(&config)?;
/// assert!(backend.health_check().await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// # Errors
    /// Returns `Err` if the pool cannot be created.
    pub fn new(config: RedisConfig) -> Result<Self> {
        let backend = Self::from_url(&config.connection_string(), config.pool_size)?;
        info!(
            "✓ Redis backend initialized: {}:{}",
            config.host, config.port
        );
        Ok(backend)
    }

    /// Build from `redis_url` and `redis_pool_size` of a [`CacheConfig`].
    ///
    /// # Errors
    /// Returns `Error::ConfigError` when no URL is configured, or `Err` if the
    /// pool cannot be created.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| Error::ConfigError("REDIS_URL is not set".to_string()))?;
        let backend = Self::from_url(url, config.redis_pool_size)?;
        info!(
            "✓ Redis backend initialized from config (pool size: {})",
            config.redis_pool_size
        );
        Ok(backend)
    }

    fn from_url(url: &str, pool_size: u32) -> Result<Self> {
        let mut cfg = PoolConfig::from_url(url);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_size as usize));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::BackendError(format!("Failed to create Redis pool: {}", e)))?;
        Ok(RedisBackend { pool })
    }

    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis GET failed for key {}: {}", key, e)))?;

        debug!(
            "✓ Redis GET {} -> {}",
            key,
            if value.is_some() { "HIT" } else { "MISS" }
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn().await?;

        match ttl {
            Some(duration) => {
                let millis = duration.as_millis().max(1) as u64;
                conn.pset_ex::<_, _, ()>(key, value, millis)
                    .await
                    .map_err(|e| {
                        Error::BackendError(format!("Redis PSETEX failed for key {}: {}", key, e))
                    })?;
                debug!("✓ Redis SET {} (TTL: {}ms)", key, millis);
            }
            None => {
                conn.set::<_, _, ()>(key, value).await.map_err(|e| {
                    Error::BackendError(format!("Redis SET failed for key {}: {}", key, e))
                })?;
                debug!("✓ Redis SET {}", key);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis DEL failed for key {}: {}", key, e)))?;

        debug!("✓ Redis DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        conn.exists(key).await.map_err(|e| {
            Error::BackendError(format!("Redis EXISTS failed for key {}: {}", key, e))
        })
    }

    async fn mget(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let values: Vec<Option<Vec<u8>>> = deadpool_redis::redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis MGET failed: {}", e)))?;

        debug!("✓ Redis MGET {} keys", keys.len());
        Ok(values)
    }

    async fn version(&self, key: &str) -> Result<String> {
        let mut conn = self.conn().await?;
        let token = new_version_token();

        let created: bool = conn.set_nx(key, &token).await.map_err(|e| {
            Error::BackendError(format!("Redis SETNX failed for key {}: {}", key, e))
        })?;
        if created {
            return Ok(token);
        }

        let current: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis GET failed for key {}: {}", key, e)))?;
        // Deleted between SETNX and GET: treat our token as current.
        Ok(current.unwrap_or(token))
    }

    async fn rotate_version(&self, key: &str) -> Result<String> {
        let mut conn = self.conn().await?;
        let token = new_version_token();
        conn.set::<_, _, ()>(key, &token).await.map_err(|e| {
            Error::BackendError(format!("Redis SET failed for key {}: {}", key, e))
        })?;

        debug!("✓ Redis rotated {}", key);
        Ok(token)
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.conn().await?;
        let pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        Ok(pong.contains("PONG"))
    }

    async fn clear_all(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        deadpool_redis::redis::cmd("FLUSHDB")
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis FLUSHDB failed: {}", e)))?;

        warn!("⚠ Redis FLUSHDB executed - all cache cleared!");
        Ok(())
    }
}
