//! Bulk action service implementation

use crate::config::QueueConfig;
use crate::core::models::{
    ActionFilter, ActionStatus, BULK_UPDATE, BulkAction, EntityType, IngestionMessage, JobFilter,
    NewBulkAction, Page, Pagination, PushJob, UploadedFile, encode,
};
use crate::core::pipeline::PipelineContext;
use crate::core::queue::QueueBroker;
use crate::core::tracker::{ActionStats, ActionTracker};
use crate::storage::database::Database;
use crate::storage::files::FileStore;
use crate::utils::error::{PipelineError, Result};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Entry point for callers that create and inspect bulk actions
#[derive(Clone)]
pub struct BulkActionService {
    db: Arc<Database>,
    broker: Arc<dyn QueueBroker>,
    files: Arc<dyn FileStore>,
    tracker: ActionTracker,
    queues: QueueConfig,
}

impl BulkActionService {
    pub fn new(ctx: &PipelineContext) -> Self {
        Self {
            db: ctx.db.clone(),
            broker: ctx.broker.clone(),
            files: ctx.files.clone(),
            tracker: ctx.tracker.clone(),
            queues: ctx.config.queues.clone(),
        }
    }

    /// Persist an uploaded source file so it can be attached to a new action
    pub async fn upload(&self, original_name: &str, content: &[u8]) -> Result<UploadedFile> {
        self.files.store(original_name, content).await
    }

    /// Validate and insert an action
    ///
    /// Actions with a schedule start SCHEDULED and wait for the scheduler; all
    /// others start PENDING and are queued for ingestion right away.
    pub async fn create_action(&self, new: NewBulkAction) -> Result<BulkAction> {
        if new.account_id.trim().is_empty() {
            return Err(PipelineError::validation("Account ID is required."));
        }
        if new.entity_type.trim().is_empty() {
            return Err(PipelineError::validation("Entity type is required."));
        }
        new.entity_type.parse::<EntityType>()?;
        if let Some(action_type) = &new.action_type {
            if action_type != BULK_UPDATE {
                return Err(PipelineError::validation(
                    "Invalid action type. Only BULK_UPDATE is currently supported.",
                ));
            }
        }
        let Some(file) = &new.file else {
            return Err(PipelineError::validation("CSV file is required."));
        };
        if !self.files.exists(&file.path).await? {
            return Err(PipelineError::validation(format!(
                "Uploaded file not found: {}",
                file.original_name
            )));
        }

        let status = if new.scheduled_at.is_some() {
            ActionStatus::Scheduled
        } else {
            ActionStatus::Pending
        };
        let action_id = Uuid::new_v4().to_string();
        let action = self.db.create_action(&action_id, &new, status).await?;
        info!(
            "Bulk action {} created for account {}, entity {}: {}",
            action.action_id, action.account_id, action.entity_type, action.status
        );

        if status == ActionStatus::Pending {
            let body = encode(&IngestionMessage {
                action_id: action.action_id.clone(),
            })?;
            self.broker.publish(&self.queues.process_file, &body).await?;
            info!(
                "Bulk action {} queued on {}",
                action.action_id, self.queues.process_file
            );
        }
        Ok(action)
    }

    pub async fn get_action(&self, action_id: &str) -> Result<BulkAction> {
        self.db.get_action(action_id).await
    }

    pub async fn list_actions(
        &self,
        filter: &ActionFilter,
        pagination: Pagination,
    ) -> Result<Page<BulkAction>> {
        self.db.list_actions(filter, pagination).await
    }

    /// Reconcile counters from job state and return the statistics projection
    pub async fn action_stats(&self, action_id: &str) -> Result<ActionStats> {
        self.tracker.reconcile(action_id).await
    }

    /// Page through an action's jobs
    pub async fn action_logs(
        &self,
        action_id: &str,
        filter: &JobFilter,
        pagination: Pagination,
    ) -> Result<Page<PushJob>> {
        self.db.get_action(action_id).await?;
        self.db.list_jobs(action_id, filter, pagination).await
    }
}
