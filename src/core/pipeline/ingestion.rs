//! Ingestion stage: source file rows to READY jobs

use super::context::PipelineContext;
use crate::core::models::{
    BulkAction, DispatchMessage, IngestionMessage, NewPushJob, Payload, decode,
};
use crate::core::queue::{Delivery, Disposition, MessageHandler};
use crate::storage::database::IngestionSummary;
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

pub const NO_VALID_ENTITIES: &str = "No valid entities found in the CSV file to process.";
pub const EMPTY_FILE: &str = "The CSV file was empty or contained no processable data rows.";

/// What an ingestion message amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionOutcome {
    /// No such action
    Missing,
    /// Another delivery already claimed the action
    AlreadyClaimed,
    /// The file produced no jobs; the action was failed
    NoJobs(IngestionSummary),
    Ingested(IngestionSummary),
}

pub struct IngestionStage {
    ctx: PipelineContext,
}

impl IngestionStage {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Claim the action, turn its file into jobs and publish dispatch batches
    pub async fn process(&self, message: &IngestionMessage) -> Result<IngestionOutcome> {
        let action_id = &message.action_id;
        let Some(action) = self.ctx.db.find_action(action_id).await? else {
            warn!("Ingestion for unknown action {}", action_id);
            return Ok(IngestionOutcome::Missing);
        };

        if action.status.is_claimed() {
            warn!(
                "Action {} is already {}, ignoring ingestion message",
                action_id, action.status
            );
            return Ok(IngestionOutcome::AlreadyClaimed);
        }

        if !self.ctx.db.claim_for_ingestion(action_id).await? {
            warn!("Action {} was claimed concurrently", action_id);
            return Ok(IngestionOutcome::AlreadyClaimed);
        }

        let Some(path) = action.file_path.clone() else {
            return Err(PipelineError::file_storage("Action has no source file"));
        };

        info!(
            "Ingesting {} for action {} ({} {})",
            path, action_id, action.entity_type, action.account_id
        );
        let result = self.ingest(&action, &path).await;

        if let Err(e) = self.ctx.files.delete(&path).await {
            warn!("Failed to delete source file {}: {}", path, e);
        }

        result
    }

    async fn ingest(&self, action: &BulkAction, path: &str) -> Result<IngestionOutcome> {
        let batch_size = self.ctx.config.ingestion.batch_size.max(1);
        let mut rows = self.ctx.files.open_rows(path).await?;

        let mut summary = IngestionSummary::default();
        let mut buffer: Vec<NewPushJob> = Vec::with_capacity(batch_size);
        // The newest stored batch is published only after the next one is stored,
        // so the last batch goes out after the summary is recorded.
        let mut held: Option<Vec<String>> = None;

        while let Some(row) = rows.next().await {
            let row = row?;
            summary.total_rows += 1;

            let Some(external_id) = self.external_id(&row) else {
                debug!(
                    "Row {} of action {} has no {}",
                    summary.total_rows, action.action_id, self.ctx.config.ingestion.id_field
                );
                summary.rejected_rows += 1;
                continue;
            };

            buffer.push(NewPushJob {
                action_id: action.action_id.clone(),
                account_id: action.account_id.clone(),
                entity_type: action.entity_type.clone(),
                external_id,
                payload: row,
            });

            if buffer.len() >= batch_size {
                self.flush(action, &mut buffer, &mut held, &mut summary).await?;
            }
        }

        if !buffer.is_empty() {
            self.flush(action, &mut buffer, &mut held, &mut summary).await?;
        }

        self.ctx
            .db
            .record_ingestion(&action.action_id, &summary)
            .await?;

        if summary.jobs_created == 0 {
            let reason = if summary.total_rows == 0 {
                EMPTY_FILE
            } else {
                NO_VALID_ENTITIES
            };
            warn!("Action {} failed: {}", action.action_id, reason);
            self.ctx.db.fail_action(&action.action_id, reason).await?;
            return Ok(IngestionOutcome::NoJobs(summary));
        }

        if let Some(last) = held {
            self.publish_batch(action, last).await?;
        }

        info!(
            "Action {} ingested: {} rows, {} jobs, {} rejected",
            action.action_id, summary.total_rows, summary.jobs_created, summary.rejected_rows
        );
        Ok(IngestionOutcome::Ingested(summary))
    }

    async fn flush(
        &self,
        action: &BulkAction,
        buffer: &mut Vec<NewPushJob>,
        held: &mut Option<Vec<String>>,
        summary: &mut IngestionSummary,
    ) -> Result<()> {
        let job_ids = self.ctx.db.insert_jobs(buffer).await?;
        buffer.clear();
        summary.jobs_created += job_ids.len() as i64;
        debug!(
            "Stored {} jobs for action {}",
            job_ids.len(),
            action.action_id
        );

        if let Some(previous) = held.replace(job_ids) {
            self.publish_batch(action, previous).await?;
        }
        Ok(())
    }

    async fn publish_batch(&self, action: &BulkAction, job_ids: Vec<String>) -> Result<()> {
        let message = DispatchMessage {
            action_id: action.action_id.clone(),
            account_id: Some(action.account_id.clone()),
            entity_type: Some(action.entity_type.clone()),
            job_ids,
            attempt: 0,
        };
        self.ctx
            .publish(&self.ctx.config.queues.process_pushjob, &message)
            .await
    }

    fn external_id(&self, row: &Payload) -> Option<String> {
        let value = row.get(&self.ctx.config.ingestion.id_field)?;
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl MessageHandler for IngestionStage {
    async fn handle(&self, delivery: &Delivery) -> Disposition {
        let message: IngestionMessage = match decode(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                error!("Discarding malformed ingestion message: {}", e);
                return Disposition::DISCARD;
            }
        };

        match self.process(&message).await {
            Ok(outcome) => {
                debug!("Ingestion of {} finished: {:?}", message.action_id, outcome);
                Disposition::Ack
            }
            Err(e) => {
                error!("Ingestion of action {} failed: {}", message.action_id, e);
                let reason = format!("File processing error: {}", e);
                if let Err(e) = self.ctx.db.fail_action(&message.action_id, &reason).await {
                    error!("Could not record failure on {}: {}", message.action_id, e);
                }
                Disposition::DISCARD
            }
        }
    }
}
