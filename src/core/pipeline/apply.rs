//! Apply stage: write PROCESSING jobs to their target store

use super::context::PipelineContext;
use crate::core::models::{ApplyMessage, CounterDelta, JobStatus, decode};
use crate::core::queue::{Delivery, Disposition, MessageHandler};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

/// Tallies of one apply batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub succeeded: i64,
    pub failed: i64,
    /// Jobs already settled by an earlier delivery
    pub ignored: i64,
    /// Whether this batch completed the action
    pub completed: bool,
}

pub struct ApplyStage {
    ctx: PipelineContext,
}

impl ApplyStage {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub async fn process(&self, message: &ApplyMessage) -> Result<ApplyOutcome> {
        let action_id = &message.action_id;
        let mut outcome = ApplyOutcome::default();

        match self.ctx.targets.get(&message.entity_type) {
            None => {
                let reason = format!("Unknown entity type: {}", message.entity_type);
                warn!("Action {}: {}", action_id, reason);
                let job_ids: Vec<String> = message
                    .job_payloads
                    .iter()
                    .map(|job| job.job_id.clone())
                    .collect();
                outcome.failed = self.ctx.db.fail_processing_jobs(&job_ids, &reason).await? as i64;
                outcome.ignored = job_ids.len() as i64 - outcome.failed;
            }
            Some(store) => {
                for job in &message.job_payloads {
                    let current = self.ctx.db.find_job(&job.job_id).await?;
                    if !matches!(&current, Some(j) if j.status == JobStatus::Processing) {
                        debug!("Job {} is not processing, skipping", job.job_id);
                        outcome.ignored += 1;
                        continue;
                    }

                    match store.upsert(job, Utc::now()).await {
                        Ok(()) => {
                            if self
                                .ctx
                                .db
                                .finish_job(&job.job_id, JobStatus::Success, None)
                                .await?
                            {
                                outcome.succeeded += 1;
                            }
                        }
                        Err(e) => {
                            let reason = format!("DB Error: {}", e.detail());
                            debug!("Job {} failed: {}", job.job_id, reason);
                            if self
                                .ctx
                                .db
                                .finish_job(&job.job_id, JobStatus::Failed, Some(&reason))
                                .await?
                            {
                                outcome.failed += 1;
                            }
                        }
                    }
                }
            }
        }

        let delta = CounterDelta {
            success: outcome.succeeded,
            failed: outcome.failed,
            skipped: 0,
        };
        if !delta.is_empty() {
            self.ctx.db.increment_action_counters(action_id, delta).await?;
        }

        outcome.completed = self.ctx.tracker.try_complete(action_id).await?;
        info!(
            "Applied batch of {}: {} succeeded, {} failed, {} ignored",
            action_id, outcome.succeeded, outcome.failed, outcome.ignored
        );
        Ok(outcome)
    }
}

#[async_trait]
impl MessageHandler for ApplyStage {
    async fn handle(&self, delivery: &Delivery) -> Disposition {
        let message: ApplyMessage = match decode(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                error!("Discarding malformed apply message: {}", e);
                return Disposition::DISCARD;
            }
        };

        match self.process(&message).await {
            Ok(_) => Disposition::Ack,
            Err(e) => {
                error!("Apply for action {} failed: {}", message.action_id, e);
                Disposition::DISCARD
            }
        }
    }
}
