//! Action aggregate tracking
//!
//! Counters on an action are a cache over its jobs. The apply stage bumps them in
//! batches; `reconcile` recounts them from job state and settles the status.

use crate::core::models::{ActionStatus, BulkAction, JobCounts};
use crate::storage::database::Database;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Statistics projection of one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStats {
    pub action_id: String,
    pub status: ActionStatus,
    /// Rows streamed from the source file
    pub total_entities_in_file: i64,
    pub jobs_created: i64,
    pub success_count: i64,
    /// Failed jobs plus rows rejected at ingestion
    pub failed_count: i64,
    pub skipped_count: i64,
    pub rejected_rows: i64,
    pub pending_count: i64,
    pub processing_count: i64,
    pub processed_entities: i64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ActionStats {
    pub fn from_parts(action: &BulkAction, counts: &JobCounts) -> Self {
        Self {
            action_id: action.action_id.clone(),
            status: action.status,
            total_entities_in_file: action.total_entities,
            jobs_created: counts.total(),
            success_count: counts.success,
            failed_count: counts.failed + action.rejected_rows,
            skipped_count: counts.skipped,
            rejected_rows: action.rejected_rows,
            pending_count: counts.ready,
            processing_count: counts.processing,
            processed_entities: counts.terminal() + action.rejected_rows,
            scheduled_at: action.scheduled_at,
            processing_started_at: action.processing_started_at,
            processing_completed_at: action.processing_completed_at,
            error_message: action.error_message.clone(),
        }
    }
}

/// Owns completion detection and counter reconciliation
#[derive(Clone)]
pub struct ActionTracker {
    db: Arc<Database>,
}

impl ActionTracker {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Mark the action COMPLETED if ingestion finished and no job is pending
    ///
    /// Returns true only for the call that performed the transition.
    pub async fn try_complete(&self, action_id: &str) -> Result<bool> {
        let pending = self.db.count_pending_jobs(action_id).await?;
        if pending > 0 {
            debug!("Action {} still has {} pending jobs", action_id, pending);
            return Ok(false);
        }

        let completed = self.db.complete_action(action_id).await?;
        if completed {
            info!("Action {} completed", action_id);
        }
        Ok(completed)
    }

    /// Recount counters from job state and settle the status
    pub async fn reconcile(&self, action_id: &str) -> Result<ActionStats> {
        let action = self.db.get_action(action_id).await?;
        let counts = self.db.count_jobs_by_status(action_id).await?;

        self.db
            .overwrite_action_counters(
                action_id,
                counts.success,
                counts.failed + action.rejected_rows,
                counts.skipped,
            )
            .await?;

        let settling = matches!(
            action.status,
            ActionStatus::Processing | ActionStatus::PartiallyCompleted
        );
        if settling && action.ingested_at.is_some() {
            if counts.pending() == 0 {
                if self.db.complete_action(action_id).await? {
                    info!("Action {} completed during reconciliation", action_id);
                }
            } else if counts.terminal() > 0 && action.status == ActionStatus::Processing {
                self.db.mark_partially_completed(action_id).await?;
            }
        }

        let action = self.db.get_action(action_id).await?;
        Ok(ActionStats::from_parts(&action, &counts))
    }
}
