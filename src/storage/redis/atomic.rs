//! Atomic counter operations

use super::pool::RedisPool;
use crate::utils::error::Result;
use redis::AsyncCommands;

impl RedisPool {
    /// Increment key value by delta
    pub async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        self.run(|mut conn| async move { conn.incr::<_, _, i64>(key, delta).await })
            .await
    }

    /// Decrement a key by a delta value
    pub async fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        self.run(|mut conn| async move { conn.decr::<_, _, i64>(key, delta).await })
            .await
    }
}
