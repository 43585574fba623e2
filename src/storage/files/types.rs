//! File storage traits and types

use crate::core::models::{Payload, UploadedFile};
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Rows of a source file in file order
///
/// Produced by a reader task; dropping the stream stops the reader.
pub struct RowStream {
    rx: mpsc::Receiver<Result<Payload>>,
}

impl RowStream {
    pub fn new(rx: mpsc::Receiver<Result<Payload>>) -> Self {
        Self { rx }
    }

    /// Next row, or `None` once the file is exhausted
    pub async fn next(&mut self) -> Option<Result<Payload>> {
        self.rx.recv().await
    }
}

/// Storage for uploaded source files
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist an uploaded file
    async fn store(&self, original_name: &str, content: &[u8]) -> Result<UploadedFile>;

    /// Stream the rows of a stored file; the header row names the fields
    async fn open_rows(&self, path: &str) -> Result<RowStream>;

    /// Remove a stored file; a missing file is not an error
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;
}
