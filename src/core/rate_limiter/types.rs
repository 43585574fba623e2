//! Rate limiter types

use std::time::Duration;

/// Rate limit result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the batch is admitted
    pub allowed: bool,
    /// Units counted in the current window, including this batch when admitted
    pub current_count: u32,
    /// Window capacity
    pub limit: u32,
    /// Units left in the window
    pub remaining: u32,
    /// Time until the window resets (only set when not allowed)
    pub retry_after: Option<Duration>,
}

impl RateLimitResult {
    /// Result used when limiting is disabled or the cache is unavailable
    pub fn unlimited(limit: u32) -> Self {
        Self {
            allowed: true,
            current_count: 0,
            limit,
            remaining: limit,
            retry_after: None,
        }
    }
}
