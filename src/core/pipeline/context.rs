//! Shared collaborators handed to every stage

use crate::config::PipelineConfig;
use crate::core::dedup::DedupFilter;
use crate::core::models::encode;
use crate::core::queue::QueueBroker;
use crate::core::rate_limiter::RateLimiter;
use crate::core::targets::TargetRegistry;
use crate::core::tracker::ActionTracker;
use crate::storage::cache::SharedCache;
use crate::storage::database::Database;
use crate::storage::files::FileStore;
use crate::utils::error::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Everything a stage needs, cheap to clone
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<PipelineConfig>,
    pub db: Arc<Database>,
    pub broker: Arc<dyn QueueBroker>,
    pub files: Arc<dyn FileStore>,
    pub limiter: Arc<RateLimiter>,
    pub dedup: Arc<DedupFilter>,
    pub targets: Arc<TargetRegistry>,
    pub tracker: ActionTracker,
}

impl PipelineContext {
    /// Wire the stages' collaborators; `cache` backs rate limiting and dedup
    pub fn new(
        config: PipelineConfig,
        db: Arc<Database>,
        broker: Arc<dyn QueueBroker>,
        files: Arc<dyn FileStore>,
        cache: Option<Arc<dyn SharedCache>>,
    ) -> Self {
        let limiter = RateLimiter::new(config.rate_limit.clone(), cache.clone());
        let dedup = DedupFilter::new(config.dedup.clone(), cache);
        let targets = TargetRegistry::with_database(db.clone(), &config.ingestion.id_field);
        let tracker = ActionTracker::new(db.clone());

        Self {
            config: Arc::new(config),
            db,
            broker,
            files,
            limiter: Arc::new(limiter),
            dedup: Arc::new(dedup),
            targets: Arc::new(targets),
            tracker,
        }
    }

    /// Replace the target stores
    pub fn with_targets(mut self, targets: TargetRegistry) -> Self {
        self.targets = Arc::new(targets);
        self
    }

    pub async fn publish<T: Serialize>(&self, queue: &str, message: &T) -> Result<()> {
        let body = encode(message)?;
        self.broker.publish(queue, &body).await
    }

    pub async fn publish_delayed<T: Serialize>(
        &self,
        queue: &str,
        message: &T,
        delay: Duration,
    ) -> Result<()> {
        let body = encode(message)?;
        self.broker.publish_delayed(queue, &body, delay).await
    }
}
