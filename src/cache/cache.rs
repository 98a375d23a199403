//! Generic cache trait and Redis implementation
//!
//! Values are stored as JSON so any serializable type can be cached. The
//! Redis implementation degrades gracefully: if no connection can be taken
//! from the pool, reads behave as misses and writes are dropped.

use super::error::CacheResult;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

#[cfg(feature = "cache")]
use super::RedisPool;
#[cfg(feature = "cache")]
use bb8::PooledConnection;
#[cfg(feature = "cache")]
use bb8_redis::redis::AsyncCommands;
#[cfg(feature = "cache")]
use bb8_redis::RedisConnectionManager;
#[cfg(feature = "cache")]
use tracing::{debug, warn};

/// Key-value store with per-entry expiry
#[async_trait]
pub trait Cache<T: Serialize + DeserializeOwned + Send + Sync + 'static>: Send + Sync {
    /// Get a value from cache by key
    async fn get(&self, key: &str) -> CacheResult<Option<T>>;

    /// Set a value in cache with optional TTL
    async fn set(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a value from cache, returning whether it existed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Check if a key exists in cache
    async fn exists(&self, key: &str) -> CacheResult<bool>;
}

#[cfg(feature = "cache")]
type RedisConnection<'a> = PooledConnection<'a, RedisConnectionManager>;

/// Redis implementation of the Cache trait
#[cfg(feature = "cache")]
#[derive(Clone)]
pub struct RedisCache {
    pool: RedisPool,
}

#[cfg(feature = "cache")]
impl RedisCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    async fn get_connection(&self) -> CacheResult<RedisConnection<'_>> {
        self.pool.get().await.map_err(|e| {
            warn!("Failed to get Redis connection: {}", e);
            e.into()
        })
    }
}

#[cfg(feature = "cache")]
#[async_trait]
impl<T: Serialize + DeserializeOwned + Send + Sync + 'static> Cache<T> for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<T>> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(None),
        };

        let result: Option<String> = conn.get(key).await.map_err(|e| {
            warn!("Redis GET failed for key '{}': {}", key, e);
            e
        })?;

        match result {
            Some(json_str) => {
                let value: T = serde_json::from_str(&json_str).map_err(|e| {
                    warn!("Failed to deserialize cache value for key '{}': {}", key, e);
                    e
                })?;
                debug!("Cache hit for key: {}", key);
                Ok(Some(value))
            }
            None => {
                debug!("Cache miss for key: {}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(()),
        };

        let json_str = serde_json::to_string(value)?;

        match ttl {
            // SETEX rejects a zero expiry
            Some(ttl_duration) => {
                let ttl_seconds = ttl_duration.as_secs().max(1);
                let _: () = conn.set_ex(key, json_str, ttl_seconds).await.map_err(|e| {
                    warn!("Redis SETEX failed for key '{}': {}", key, e);
                    e
                })?;
            }
            None => {
                let _: () = conn.set(key, json_str).await.map_err(|e| {
                    warn!("Redis SET failed for key '{}': {}", key, e);
                    e
                })?;
            }
        }

        debug!("Cache set for key: {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(false),
        };

        let removed: i32 = conn.del(key).await.map_err(|e| {
            warn!("Redis DEL failed for key '{}': {}", key, e);
            e
        })?;

        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(false),
        };

        let found: bool = conn.exists(key).await.map_err(|e| {
            warn!("Redis EXISTS failed for key '{}': {}", key, e);
            e
        })?;

        Ok(found)
    }
}
