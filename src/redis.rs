use std::time::Duration;

use async_trait::async_trait;
use log::info;
use redis::aio::ConnectionManager;

use crate::cache::{CacheError, RankCache};

pub struct RedisCache {
    con: ConnectionManager,
}

impl RedisCache {
    pub async fn new(url: &str) -> Result<RedisCache, CacheError> {
        let client = redis::Client::open(url)?;
        let con = client.get_connection_manager().await?;
        info!("Connected to redis at {}", url);
        Ok(RedisCache { con })
    }
}

/// `EX` only takes whole seconds, never less than one.
fn expiry_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl RankCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut con = self.con.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut con)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut con = self.con.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(expiry_secs(ttl))
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }
}
