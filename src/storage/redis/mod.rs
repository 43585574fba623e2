//! Redis storage implementation
//!
//! This module provides Redis connectivity and the shared cache operations used by
//! the rate limiter, the dedup filter and the Redis queue broker.
//!
//! ## Module Structure
//!
//! - `pool` - Connection lifecycle (connect with backoff, reconnect, health check, close)
//! - `cache` - Key-value operations with TTLs (get, set NX EX, expire, pttl)
//! - `atomic` - Atomic counter operations
//! - `tests` - Module tests

mod atomic;
mod cache;
mod pool;

pub use pool::RedisPool;
