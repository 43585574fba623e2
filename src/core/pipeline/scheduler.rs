//! Periodic release of scheduled actions

use super::context::PipelineContext;
use crate::core::models::{BulkAction, IngestionMessage};
use crate::utils::error::Result;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Result of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub due: usize,
    pub started: usize,
    pub failed: usize,
}

pub struct Scheduler {
    ctx: PipelineContext,
}

impl Scheduler {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Start every SCHEDULED action whose time has come
    pub async fn run_once(&self) -> Result<SweepReport> {
        let due = self.ctx.db.find_due_scheduled_actions(Utc::now()).await?;
        let mut report = SweepReport {
            due: due.len(),
            ..SweepReport::default()
        };

        for action in &due {
            match self.start(action).await {
                Ok(true) => report.started += 1,
                Ok(false) => debug!("Action {} was started elsewhere", action.action_id),
                Err(e) => {
                    error!("Failed to start scheduled action {}: {}", action.action_id, e);
                    report.failed += 1;
                    let reason = format!("Failed to start scheduled processing: {}", e);
                    if let Err(e) = self.ctx.db.fail_action(&action.action_id, &reason).await {
                        error!("Could not record failure on {}: {}", action.action_id, e);
                    }
                }
            }
        }

        if report.due > 0 {
            info!(
                "Scheduler sweep: {} due, {} started, {} failed",
                report.due, report.started, report.failed
            );
        }
        Ok(report)
    }

    async fn start(&self, action: &BulkAction) -> Result<bool> {
        if !self
            .ctx
            .db
            .promote_scheduled_action(&action.action_id)
            .await?
        {
            return Ok(false);
        }

        let message = IngestionMessage {
            action_id: action.action_id.clone(),
        };
        self.ctx
            .publish(&self.ctx.config.queues.process_file, &message)
            .await?;
        Ok(true)
    }

    /// Sweep on the configured interval until `shutdown` turns true
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = self.ctx.config.scheduler.interval();
        tokio::spawn(async move {
            info!("Scheduler running every {:?}", period);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            error!("Scheduler sweep failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Scheduler stopped");
        })
    }
}
