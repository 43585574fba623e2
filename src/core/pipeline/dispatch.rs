//! Dispatch stage: rate limiting, dedup and promotion of READY jobs

use super::context::PipelineContext;
use crate::config::{QueueConfig, RedeliveryConfig};
use crate::core::models::{
    ApplyMessage, CounterDelta, DispatchMessage, JobPayload, JobStatus, decode,
};
use crate::core::queue::{Delivery, Disposition, MessageHandler};
use crate::utils::error::{Result, RetryPolicy};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What a dispatch message amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The action is missing or terminal
    Ignored,
    /// Over the account's rate limit; the batch comes back after `delay`
    Deferred { delay: Duration },
    Dispatched { promoted: usize, skipped: usize },
}

/// Where a failed dispatch message goes next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redelivery {
    Immediate,
    Delayed(Duration),
    Poison,
}

impl Redelivery {
    /// Plan for a message whose delivery number `attempt` just failed
    pub fn plan(attempt: u32, config: &RedeliveryConfig) -> Self {
        if attempt < config.immediate_retries {
            Redelivery::Immediate
        } else if attempt < config.backoff.max_attempts {
            let retry = attempt - config.immediate_retries + 1;
            Redelivery::Delayed(RetryPolicy::new(config.backoff.clone()).delay_for(retry))
        } else {
            Redelivery::Poison
        }
    }
}

pub struct DispatchStage {
    ctx: PipelineContext,
}

impl DispatchStage {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub async fn process(&self, message: &DispatchMessage) -> Result<DispatchOutcome> {
        let action_id = &message.action_id;
        let action = match self.ctx.db.find_action(action_id).await? {
            Some(action) if !action.status.is_terminal() => action,
            Some(action) => {
                debug!("Action {} is {}, dropping batch", action_id, action.status);
                return Ok(DispatchOutcome::Ignored);
            }
            None => {
                warn!("Dispatch for unknown action {}", action_id);
                return Ok(DispatchOutcome::Ignored);
            }
        };

        let account_id = message
            .account_id
            .clone()
            .unwrap_or_else(|| action.account_id.clone());
        let entity_type = message
            .entity_type
            .clone()
            .unwrap_or_else(|| action.entity_type.clone());

        let units = u32::try_from(message.job_ids.len()).unwrap_or(u32::MAX);
        let decision = self.ctx.limiter.check(&account_id, units).await;
        if !decision.allowed {
            let delay = decision
                .retry_after
                .unwrap_or_else(|| self.ctx.config.rate_limit.requeue_delay());
            info!(
                "Account {} over its limit ({}/{}), deferring {} jobs of {} by {:?}",
                account_id,
                decision.current_count,
                decision.limit,
                message.job_ids.len(),
                action_id,
                delay
            );
            self.ctx
                .publish_delayed(&self.ctx.config.queues.process_pushjob, message, delay)
                .await?;
            return Ok(DispatchOutcome::Deferred { delay });
        }

        // PROCESSING jobs belong to an earlier delivery that stopped before publishing
        let jobs = self
            .ctx
            .db
            .find_jobs_in_status(&message.job_ids, &JobStatus::PENDING)
            .await?;

        let mut payloads = Vec::with_capacity(jobs.len());
        let mut skipped = 0usize;
        for job in &jobs {
            if job.status == JobStatus::Processing {
                payloads.push(JobPayload::from(job));
                continue;
            }

            let outcome = self.ctx.dedup.claim(job).await;
            if let Some(reason) = outcome.skip_reason() {
                if self.ctx.db.skip_job(&job.job_id, &reason).await? {
                    debug!("Skipped job {}: {}", job.job_id, reason);
                    skipped += 1;
                }
            } else if self.ctx.db.promote_job(&job.job_id).await? {
                payloads.push(JobPayload::from(job));
            }
        }

        if skipped > 0 {
            let delta = CounterDelta {
                skipped: skipped as i64,
                ..CounterDelta::default()
            };
            self.ctx.db.increment_action_counters(action_id, delta).await?;
        }

        let promoted = payloads.len();
        if promoted > 0 || skipped > 0 {
            // Sent even when everything was skipped so apply runs the completion check
            let apply = ApplyMessage {
                action_id: action_id.clone(),
                account_id,
                entity_type,
                job_payloads: payloads,
            };
            self.ctx
                .publish(&self.ctx.config.queues.push_entity, &apply)
                .await?;
        }

        debug!(
            "Dispatched {} jobs of {} ({} skipped)",
            promoted, action_id, skipped
        );
        Ok(DispatchOutcome::Dispatched { promoted, skipped })
    }

    async fn redeliver(&self, message: &DispatchMessage) -> Result<Redelivery> {
        let queue = &self.ctx.config.queues.process_pushjob;
        let plan = Redelivery::plan(message.attempt, &self.ctx.config.queues.dispatch_retry);
        let retry = DispatchMessage {
            attempt: message.attempt + 1,
            ..message.clone()
        };

        match &plan {
            Redelivery::Immediate => self.ctx.publish(queue, &retry).await?,
            Redelivery::Delayed(delay) => self.ctx.publish_delayed(queue, &retry, *delay).await?,
            Redelivery::Poison => {
                self.ctx
                    .publish(&QueueConfig::poison_queue(queue), &retry)
                    .await?
            }
        }
        Ok(plan)
    }
}

#[async_trait]
impl MessageHandler for DispatchStage {
    async fn handle(&self, delivery: &Delivery) -> Disposition {
        let message: DispatchMessage = match decode(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                error!("Discarding malformed dispatch message: {}", e);
                return Disposition::DISCARD;
            }
        };

        let error = match self.process(&message).await {
            Ok(outcome) => {
                debug!("Dispatch for {} finished: {:?}", message.action_id, outcome);
                return Disposition::Ack;
            }
            Err(e) => e,
        };

        error!(
            "Dispatch attempt {} for action {} failed: {}",
            message.attempt, message.action_id, error
        );
        match self.redeliver(&message).await {
            Ok(Redelivery::Poison) => {
                error!(
                    "Dispatch batch of {} moved to the poison queue after {} attempts",
                    message.action_id,
                    message.attempt + 1
                );
                Disposition::Ack
            }
            Ok(plan) => {
                warn!("Dispatch batch of {} redelivered: {:?}", message.action_id, plan);
                Disposition::Ack
            }
            Err(e) => {
                error!("Could not republish dispatch batch of {}: {}", message.action_id, e);
                Disposition::REQUEUE
            }
        }
    }
}
