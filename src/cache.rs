use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::{
    future::{Cache, CacheBuilder},
    Expiry,
};
use redis::RedisError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum CacheError {
    #[error("[REDIS] Error talking to cache: {0}")]
    RedisError(#[from] RedisError),
}

/// Key-value cache with per-entry expiry. No locking across calls: two
/// writers racing on the same key simply leave the last value behind.
#[async_trait]
pub trait RankCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process stand-in for redis.
pub struct MemoryCache {
    cache: Cache<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache {
            cache: CacheBuilder::new(64) // a handful of named slots
                .expire_after(EntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        MemoryCache::new()
    }
}

#[async_trait]
impl RankCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.cache.insert(key.to_owned(), Entry { value, ttl }).await;
        Ok(())
    }
}
