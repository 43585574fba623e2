//! Bulk action aggregate and its status machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::PipelineError;

/// The only supported action kind
pub const BULK_UPDATE: &str = "BULK_UPDATE";

/// Lifecycle of a bulk action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    /// Created, waiting for ingestion
    Pending,
    /// Waiting for its scheduled time
    Scheduled,
    /// File ingestion started
    Processing,
    /// Ingestion finished, some jobs still pending
    PartiallyCompleted,
    /// Every job reached a terminal state
    Completed,
    /// Terminal failure recorded on the action
    Failed,
}

impl ActionStatus {
    pub const ALL: [ActionStatus; 6] = [
        ActionStatus::Pending,
        ActionStatus::Scheduled,
        ActionStatus::Processing,
        ActionStatus::PartiallyCompleted,
        ActionStatus::Completed,
        ActionStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "PENDING",
            ActionStatus::Scheduled => "SCHEDULED",
            ActionStatus::Processing => "PROCESSING",
            ActionStatus::PartiallyCompleted => "PARTIALLY_COMPLETED",
            ActionStatus::Completed => "COMPLETED",
            ActionStatus::Failed => "FAILED",
        }
    }

    /// COMPLETED and FAILED never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Failed)
    }

    /// Ingestion has already claimed (or finished with) the action
    pub fn is_claimed(&self) -> bool {
        matches!(
            self,
            ActionStatus::Processing
                | ActionStatus::PartiallyCompleted
                | ActionStatus::Completed
                | ActionStatus::Failed
        )
    }

    /// Status only advances forward, or regresses to FAILED
    pub fn can_transition_to(&self, next: ActionStatus) -> bool {
        use ActionStatus::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Processing) => true,
            (Scheduled, Pending) | (Scheduled, Processing) => true,
            (Processing, PartiallyCompleted) | (Processing, Completed) => true,
            (PartiallyCompleted, Completed) => true,
            _ => false,
        }
    }

    /// Statuses from which `next` may be reached
    pub fn sources_of(next: ActionStatus) -> Vec<ActionStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(next))
            .collect()
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ActionStatus::Pending),
            "SCHEDULED" => Ok(ActionStatus::Scheduled),
            "PROCESSING" => Ok(ActionStatus::Processing),
            "PARTIALLY_COMPLETED" => Ok(ActionStatus::PartiallyCompleted),
            "COMPLETED" => Ok(ActionStatus::Completed),
            "FAILED" => Ok(ActionStatus::Failed),
            other => Err(PipelineError::validation(format!(
                "Unknown action status: {}",
                other
            ))),
        }
    }
}

/// One user-submitted bulk update request and its aggregate state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAction {
    pub action_id: String,
    pub account_id: String,
    pub action_type: String,
    pub entity_type: String,
    pub status: ActionStatus,
    pub original_file_name: Option<String>,
    pub file_path: Option<String>,
    pub total_entities: i64,
    pub processed_entities: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub skipped_count: i64,
    /// Rows rejected at ingestion for a missing identifier; part of `failed_count`
    pub rejected_rows: i64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    /// Set once the source file has been fully streamed
    pub ingested_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a bulk action
#[derive(Debug, Clone, Default)]
pub struct NewBulkAction {
    pub account_id: String,
    pub entity_type: String,
    /// Defaults to `BULK_UPDATE`
    pub action_type: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub file: Option<UploadedFile>,
}

/// A source file already persisted by the upload collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub original_name: String,
    pub path: String,
}

/// Counter deltas applied to an action in one update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub success: i64,
    pub failed: i64,
    pub skipped: i64,
}

impl CounterDelta {
    pub fn processed(&self) -> i64 {
        self.success + self.failed + self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.processed() == 0
    }
}
