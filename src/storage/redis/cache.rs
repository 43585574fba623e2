//! Key-value cache operations

use super::pool::RedisPool;
use crate::storage::cache::SharedCache;
use crate::utils::error::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

impl RedisPool {
    /// Get a value from cache
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run(|mut conn| async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    /// Set a key only if it does not exist, with a TTL in seconds
    pub async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool> {
        let reply: Option<String> = self
            .run(|mut conn| async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_seconds)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(reply.is_some())
    }

    /// Set expiration time for a key, in milliseconds
    pub async fn pexpire(&self, key: &str, ttl_ms: u64) -> Result<()> {
        self.run(|mut conn| async move { conn.pexpire::<_, ()>(key, ttl_ms as i64).await })
            .await
    }

    /// Remaining time to live in milliseconds (-1 without expiry, -2 when missing)
    pub async fn pttl(&self, key: &str) -> Result<i64> {
        self.run(|mut conn| async move { conn.pttl::<_, i64>(key).await })
            .await
    }
}

#[async_trait]
impl SharedCache for RedisPool {
    async fn get_counter(&self, key: &str) -> Result<i64> {
        let value = self.get(key).await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.increment(key, delta).await
    }

    async fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.decrement(key, delta).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.pexpire(key, ttl.as_millis() as u64).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let ttl_ms = self.pttl(key).await?;
        Ok((ttl_ms >= 0).then(|| Duration::from_millis(ttl_ms as u64)))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        RedisPool::get(self, key).await
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        RedisPool::set_nx_ex(self, key, value, ttl.as_secs().max(1)).await
    }
}
