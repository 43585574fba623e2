//! Services module
//!
//! Operations exposed to callers outside the pipeline

pub mod bulk_actions;

pub use bulk_actions::BulkActionService;
