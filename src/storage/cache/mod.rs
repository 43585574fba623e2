//! Shared TTL cache
//!
//! The rate limiter and the dedup filter only need a handful of counter and key
//! operations. Redis provides them across workers; `MemoryCache` provides them inside
//! one process.

mod memory;

pub use memory::MemoryCache;

use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Counter and key operations shared by every worker
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Current integer value of a key, zero when missing
    async fn get_counter(&self, key: &str) -> Result<i64>;

    /// Atomically add `delta`, returning the new value
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Atomically subtract `delta`, returning the new value
    async fn decr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Set the expiry of an existing key
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Remaining lifetime of a key, `None` when missing or without expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` only if the key is absent; returns whether it was stored
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;
}
