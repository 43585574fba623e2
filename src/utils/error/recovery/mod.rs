//! Error recovery patterns
//!
//! Retry with exponential backoff, used for client connects and message redelivery.

mod retry;
mod types;

pub use retry::RetryPolicy;
pub use types::RetryConfig;
pub(crate) use types::duration_ms;
