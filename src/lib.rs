//! # bulk-actions
//!
//! Queue-driven bulk update pipeline for CRM entities.
//!
//! A bulk action is a CSV file of entity updates for one account. Its rows flow through
//! three queue stages:
//!
//! - **Ingestion** streams the file into READY jobs and publishes them in batches
//! - **Dispatch** applies the per-account rate limit and per-action dedup, then promotes jobs
//! - **Apply** upserts each job into its target store and completes the action
//!
//! A scheduler releases actions created with a future start time.
//!
//! ## Worker
//!
//! ```rust,no_run
//! use bulk_actions::{Config, Pipeline, PipelineContext};
//! use bulk_actions::storage::StorageLayer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/bulk-worker.yaml").await?;
//!     let storage = StorageLayer::new(&config.pipeline).await?;
//!     storage.migrate().await?;
//!
//!     let ctx = PipelineContext::new(
//!         config.pipeline.clone(),
//!         storage.database.clone(),
//!         storage.broker(&config.pipeline),
//!         storage.files.clone(),
//!         Some(storage.shared_cache()),
//!     );
//!     let pipeline = Pipeline::new(ctx);
//!     pipeline.prepare().await?;
//!     let handle = pipeline.start();
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await;
//!     storage.close().await?;
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use utils::error::{PipelineError, Result};

pub use core::models::{
    ActionStatus, BulkAction, EntityType, JobStatus, NewBulkAction, PushJob, UploadedFile,
};
pub use core::pipeline::{Pipeline, PipelineContext, PipelineHandle};
pub use core::queue::{MemoryBroker, QueueBroker, RedisBroker};
pub use core::tracker::ActionStats;
pub use services::BulkActionService;

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
