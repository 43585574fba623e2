//! Source file storage
//!
//! Uploaded CSV files are read back as a stream of header-keyed rows and deleted once
//! ingestion is done with them.

mod local;
mod types;

// Re-export public types
pub use local::LocalFileStore;
pub use types::{FileStore, RowStream};
