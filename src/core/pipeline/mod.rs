//! The three queue stages and the scheduler
//!
//! Ingestion turns a source file into READY jobs and publishes dispatch batches.
//! Dispatch rate limits and deduplicates a batch, promotes its jobs to PROCESSING
//! and publishes them for apply. Apply writes each job to its target store and
//! completes the action once nothing is pending.

mod apply;
mod context;
mod dispatch;
mod ingestion;
mod scheduler;

pub use apply::{ApplyOutcome, ApplyStage};
pub use context::PipelineContext;
pub use dispatch::{DispatchOutcome, DispatchStage, Redelivery};
pub use ingestion::{EMPTY_FILE, IngestionOutcome, IngestionStage, NO_VALID_ENTITIES};
pub use scheduler::{Scheduler, SweepReport};

use crate::config::QueueConfig;
use crate::core::queue::{Consumer, MessageHandler};
use crate::utils::error::{Result, RetryPolicy};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Owns the stage consumers and the scheduler
pub struct Pipeline {
    ctx: PipelineContext,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Declare every queue and return messages left in flight by a previous run
    pub async fn prepare(&self) -> Result<()> {
        let queues = &self.ctx.config.queues;
        for queue in queues.all() {
            self.ctx.broker.declare(queue).await?;
        }
        self.ctx
            .broker
            .declare(&QueueConfig::poison_queue(&queues.process_pushjob))
            .await?;

        for queue in queues.all() {
            let recovered = self.ctx.broker.recover(queue).await?;
            if recovered > 0 {
                warn!("Recovered {} in-flight messages on {}", recovered, queue);
            }
        }
        Ok(())
    }

    /// Spawn the consumers and, when enabled, the scheduler
    pub fn start(&self) -> PipelineHandle {
        let (shutdown, rx) = watch::channel(false);
        let config = &self.ctx.config;
        let queues = &config.queues;
        let backoff = RetryPolicy::new(config.redis.connect_retry.clone());

        let consumers: [(&str, Arc<dyn MessageHandler>, usize); 3] = [
            (
                queues.process_file.as_str(),
                Arc::new(IngestionStage::new(self.ctx.clone())),
                queues.ingestion_prefetch,
            ),
            (
                queues.process_pushjob.as_str(),
                Arc::new(DispatchStage::new(self.ctx.clone())),
                1,
            ),
            (
                queues.push_entity.as_str(),
                Arc::new(ApplyStage::new(self.ctx.clone())),
                1,
            ),
        ];

        let mut tasks: Vec<JoinHandle<()>> = consumers
            .into_iter()
            .map(|(queue, handler, prefetch)| {
                Consumer::new(self.ctx.broker.clone(), queue, handler)
                    .prefetch(prefetch)
                    .poll_interval(queues.poll_interval())
                    .backoff(backoff.clone())
                    .spawn(rx.clone())
            })
            .collect();

        if config.scheduler.enabled {
            tasks.push(Scheduler::new(self.ctx.clone()).spawn(rx));
        }

        info!("Pipeline started with {} tasks", tasks.len());
        PipelineHandle { shutdown, tasks }
    }
}

/// Running pipeline tasks
pub struct PipelineHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Stop receiving, let in-flight handlers finish and wait for every task
    pub async fn shutdown(self) {
        info!("Shutting down pipeline");
        let _ = self.shutdown.send(true);
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!("Pipeline task ended abnormally: {}", e);
            }
        }
        info!("Pipeline stopped");
    }
}
