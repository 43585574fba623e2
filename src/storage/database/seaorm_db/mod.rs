// Module declarations
mod types;
mod connection;
mod convert;
mod action_ops;
mod job_ops;
mod contact_ops;

// Re-export public types
pub use types::{DatabaseBackendType, IngestionSummary, SeaOrmDatabase};
