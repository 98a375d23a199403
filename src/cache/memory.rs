//! Process-local cache
//!
//! Same JSON-in, JSON-out contract as `RedisCache`, backed by a map guarded by
//! a tokio `RwLock`. Expired entries are dropped lazily on access.

use super::cache::Cache;
use super::error::CacheResult;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    json: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop `key` if it is still expired at `now`. A `set` may have landed
    /// between releasing the read lock and taking the write lock.
    async fn evict_expired(&self, key: &str, now: Instant) {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl<T: Serialize + DeserializeOwned + Send + Sync + 'static> Cache<T> for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<T>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    debug!("Cache hit for key: {}", key);
                    return Ok(Some(serde_json::from_str(&entry.json)?));
                }
                Some(_) => {}
                None => {
                    debug!("Cache miss for key: {}", key);
                    return Ok(None);
                }
            }
        }

        self.evict_expired(key, now).await;
        debug!("Cache entry expired for key: {}", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = Entry {
            json: serde_json::to_string(value)?,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|entry| !entry.is_expired(Instant::now())))
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now())))
    }
}
