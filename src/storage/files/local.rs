//! Local file system storage implementation

use crate::core::models::{Payload, UploadedFile};
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{FileStore, RowStream};

/// Rows buffered between the reader task and the consumer
const ROW_BUFFER: usize = 256;

/// Local file storage
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    base_path: PathBuf,
}

impl LocalFileStore {
    /// Create a new local storage instance
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let path = base_path.as_ref().to_path_buf();

        if !path.exists() {
            fs::create_dir_all(&path).await.map_err(|e| {
                PipelineError::FileStorage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        info!("Local file storage initialized at: {}", path.display());
        Ok(Self { base_path: path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Keep only characters that are safe in a file name
    pub(crate) fn sanitize_name(name: &str) -> String {
        let cleaned: String = name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.trim_matches('.').is_empty() {
            "upload.csv".to_string()
        } else {
            cleaned
        }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store(&self, original_name: &str, content: &[u8]) -> Result<UploadedFile> {
        let file_name = format!("{}_{}", Uuid::new_v4(), Self::sanitize_name(original_name));
        let file_path = self.base_path.join(file_name);

        let mut file = fs::File::create(&file_path)
            .await
            .map_err(|e| PipelineError::FileStorage(format!("Failed to create file: {}", e)))?;
        file.write_all(content)
            .await
            .map_err(|e| PipelineError::FileStorage(format!("Failed to write file: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| PipelineError::FileStorage(format!("Failed to write file: {}", e)))?;

        debug!("File stored: {} -> {}", original_name, file_path.display());
        Ok(UploadedFile {
            original_name: original_name.to_string(),
            path: file_path.to_string_lossy().into_owned(),
        })
    }

    async fn open_rows(&self, path: &str) -> Result<RowStream> {
        let path = PathBuf::from(path);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(PipelineError::FileStorage(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let (tx, rx) = mpsc::channel(ROW_BUFFER);
        tokio::task::spawn_blocking(move || read_rows(&path, tx));
        Ok(RowStream::new(rx))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("File deleted: {}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::FileStorage(format!(
                "Failed to delete file: {}",
                e
            ))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(path).await.unwrap_or(false))
    }
}

/// Blocking CSV reader feeding a row channel
fn read_rows(path: &Path, tx: mpsc::Sender<Result<Payload>>) {
    let mut reader = match csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            let _ = tx.blocking_send(Err(e.into()));
            return;
        }
    };

    let headers: Vec<String> = match reader.headers() {
        Ok(headers) => headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect(),
        Err(e) => {
            let _ = tx.blocking_send(Err(e.into()));
            return;
        }
    };

    for record in reader.records() {
        let row = record.map_err(PipelineError::from).map(|record| {
            headers
                .iter()
                .zip(record.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, value)| (header.clone(), Value::String(value.to_string())))
                .collect::<Payload>()
        });
        let failed = row.is_err();
        if tx.blocking_send(row).is_err() {
            warn!("Row consumer went away before {} was fully read", path.display());
            return;
        }
        if failed {
            return;
        }
    }
}
