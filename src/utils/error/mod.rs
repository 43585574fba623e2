//! Error Handling utilities
//!
//! This module provides the pipeline error type and retry/backoff recovery.

pub mod error;
pub mod recovery;

// Re-export commonly used types and functions
pub use error::*;
pub use recovery::*;
