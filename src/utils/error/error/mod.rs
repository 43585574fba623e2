//! Error handling for the pipeline
//!
//! This module defines all error types used throughout the pipeline.

#![allow(missing_docs)]

mod helpers;
mod types;

pub use helpers::{MAX_ERROR_TEXT_LEN, error_text, truncate_chars};
pub use types::{PipelineError, Result};
