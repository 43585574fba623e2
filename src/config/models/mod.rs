//! Configuration data models
//!
//! This module defines all configuration structures used throughout the pipeline.

#![allow(missing_docs)]

pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod rate_limit;
pub mod storage;

// Re-export all configuration types
pub use logging::*;
pub use pipeline::*;
pub use queue::*;
pub use rate_limit::*;
pub use storage::*;

/// Default connection timeout in seconds
pub fn default_connection_timeout() -> u64 {
    5
}

/// Default database connection pool size
pub fn default_max_connections() -> u32 {
    10
}

/// Default ingestion flush size
pub fn default_batch_size() -> usize {
    100
}

/// Default fixed window length in milliseconds
pub fn default_window_ms() -> u64 {
    60_000
}

/// Default requests admitted per window and account
pub fn default_max_requests() -> u32 {
    1000
}

/// Default deferral when the limiter gives no hint
pub fn default_requeue_delay_ms() -> u64 {
    5_000
}

/// Default dedup key lifetime (24 hours)
pub fn default_dedup_ttl_secs() -> u64 {
    24 * 60 * 60
}

/// Default scheduler sweep interval
pub fn default_scheduler_interval_secs() -> u64 {
    60
}

pub(crate) fn default_true() -> bool {
    true
}
