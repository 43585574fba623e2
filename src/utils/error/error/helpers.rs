//! Helper functions for creating and inspecting errors

use super::types::PipelineError;

/// Maximum length of an error text recorded on a job or action
pub const MAX_ERROR_TEXT_LEN: usize = 255;

impl PipelineError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn queue<S: Into<String>>(message: S) -> Self {
        Self::Queue(message.into())
    }

    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache(message.into())
    }

    pub fn file_storage<S: Into<String>>(message: S) -> Self {
        Self::FileStorage(message.into())
    }

    pub fn target<S: Into<String>>(message: S) -> Self {
        Self::Target(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error refers to a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Message without the category prefix
    pub fn detail(&self) -> String {
        match self {
            Self::Config(message)
            | Self::Validation(message)
            | Self::NotFound(message)
            | Self::Queue(message)
            | Self::Cache(message)
            | Self::FileStorage(message)
            | Self::Target(message)
            | Self::Internal(message) => message.clone(),
            Self::Database(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the error comes from shared infrastructure that may recover on its own
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
            Self::Queue(_) | Self::Cache(_) => true,
            Self::Database(sea_orm::DbErr::ConnectionAcquire(_)) => true,
            _ => false,
        }
    }
}

/// Truncate a message to at most `MAX_ERROR_TEXT_LEN` characters
pub fn error_text(message: impl AsRef<str>) -> String {
    truncate_chars(message.as_ref(), MAX_ERROR_TEXT_LEN)
}

/// Truncate a string on a character boundary
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
