//! Per-account rate limiting
//!
//! Fixed-window counters kept in the shared cache, so every worker draws from the same
//! budget. The limiter fails open: without a reachable cache every batch is admitted.

mod limiter;
mod types;


// Re-export public types
pub use limiter::RateLimiter;
pub use types::RateLimitResult;
