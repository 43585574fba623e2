//! Common test utilities for bulk-actions
//!
//! This module provides shared test infrastructure for all tests:
//! - In-memory SQLite database support
//! - CSV fixtures and action factories
//! - An in-process pipeline harness over the memory broker
//! - Custom assertions and helpers
//!
//! # Usage
//!
//! ```rust
//! use crate::common::{CsvFixture, TestPipeline};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let pipeline = TestPipeline::new().await;
//!     let csv = CsvFixture::contacts().row(&["1", "Ada", "ada@example.com"]).build();
//!     let action = pipeline.submit(&csv).await;
//!     pipeline.run_until_idle().await;
//!     // ...
//! }
//! ```

pub mod pipeline;

// Re-export commonly used items
pub use database::TestDatabase;
pub use assertions::{ActionAssertions, assert_completed};
pub use fixtures::{ActionFactory, CsvFixture, JobFactory};
pub use pipeline::{FailingBroker, TestPipeline};

/// Skip test if environment variable is not set
#[macro_export]
macro_rules! skip_without_env {
    ($var:expr) => {
        if std::env::var($var).is_err() {
            eprintln!("Skipping test: {} environment variable not set", $var);
            return;
        }
    };
}

/// Assert that a result is Ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a result is Err
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}
