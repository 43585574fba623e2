//! In-process pipeline harness
//!
//! Wires the stages to an in-memory SQLite database, the memory broker, the memory
//! cache and a temporary upload directory. Stages are pumped by hand so tests can
//! observe every intermediate state.

use super::database::TestDatabase;
use super::fixtures::ActionFactory;
use async_trait::async_trait;
use bulk_actions::config::{PipelineConfig, QueueConfig};
use bulk_actions::core::models::{BulkAction, UploadedFile};
use bulk_actions::core::pipeline::{ApplyStage, DispatchStage, IngestionStage, PipelineContext};
use bulk_actions::core::queue::{Delivery, MemoryBroker, MessageHandler, QueueBroker, QueueDepth};
use bulk_actions::services::BulkActionService;
use bulk_actions::storage::cache::{MemoryCache, SharedCache};
use bulk_actions::storage::files::{FileStore, LocalFileStore};
use bulk_actions::utils::error::{PipelineError, Result};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestPipeline {
    pub db: TestDatabase,
    pub broker: MemoryBroker,
    pub cache: Option<Arc<MemoryCache>>,
    pub files: Arc<LocalFileStore>,
    pub ctx: PipelineContext,
    pub service: BulkActionService,
    _dir: TempDir,
}

impl TestPipeline {
    /// Configuration with a capacity large enough that nothing is deferred
    pub fn test_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.rate_limit.max_requests = 10_000;
        config.ingestion.batch_size = 100;
        config.queues.poll_interval_ms = 10;
        config.scheduler.enabled = false;
        config
    }

    pub async fn new() -> Self {
        Self::with_config(Self::test_config()).await
    }

    pub async fn with_config(config: PipelineConfig) -> Self {
        Self::build(config, Some(Arc::new(MemoryCache::new()))).await
    }

    /// Harness without a shared cache: no rate limiting, no dedup
    pub async fn without_cache(config: PipelineConfig) -> Self {
        Self::build(config, None).await
    }

    async fn build(config: PipelineConfig, cache: Option<Arc<MemoryCache>>) -> Self {
        let db = TestDatabase::new().await;
        let dir = TempDir::new().expect("temp dir");
        let files = Arc::new(
            LocalFileStore::new(dir.path())
                .await
                .expect("file store"),
        );
        let broker = MemoryBroker::new();
        let shared = cache.clone().map(|c| c as Arc<dyn SharedCache>);
        let ctx = PipelineContext::new(
            config,
            db.db_arc(),
            Arc::new(broker.clone()),
            files.clone(),
            shared,
        );
        let service = BulkActionService::new(&ctx);

        Self {
            db,
            broker,
            cache,
            files,
            ctx,
            service,
            _dir: dir,
        }
    }

    /// Same storage, different broker
    pub fn context_with_broker(&self, broker: Arc<dyn QueueBroker>) -> PipelineContext {
        PipelineContext {
            broker,
            ..self.ctx.clone()
        }
    }

    pub fn queues(&self) -> &QueueConfig {
        &self.ctx.config.queues
    }

    pub async fn upload(&self, csv: &str) -> UploadedFile {
        self.files
            .store("contacts.csv", csv.as_bytes())
            .await
            .expect("upload")
    }

    /// Upload a contact file and create an immediate action for it
    pub async fn submit(&self, csv: &str) -> BulkAction {
        let file = self.upload(csv).await;
        self.service
            .create_action(ActionFactory::contacts(file))
            .await
            .expect("create action")
    }

    pub async fn action(&self, action_id: &str) -> BulkAction {
        self.db.db().get_action(action_id).await.expect("action")
    }

    /// Handle and settle every ready message of `queue`, returning how many were handled
    pub async fn pump(&self, queue: &str, handler: &dyn MessageHandler) -> usize {
        let mut handled = 0;
        while let Some(delivery) = self
            .broker
            .receive(queue, Duration::ZERO)
            .await
            .expect("receive")
        {
            let disposition = handler.handle(&delivery).await;
            self.broker
                .settle(&delivery, disposition)
                .await
                .expect("settle");
            handled += 1;
        }
        handled
    }

    pub async fn run_ingestion(&self) -> usize {
        let stage = IngestionStage::new(self.ctx.clone());
        self.pump(&self.queues().process_file, &stage).await
    }

    pub async fn run_dispatch(&self) -> usize {
        let stage = DispatchStage::new(self.ctx.clone());
        self.pump(&self.queues().process_pushjob, &stage).await
    }

    pub async fn run_apply(&self) -> usize {
        let stage = ApplyStage::new(self.ctx.clone());
        self.pump(&self.queues().push_entity, &stage).await
    }

    /// Pump all stages until no ready message is left
    pub async fn run_until_idle(&self) {
        loop {
            let handled =
                self.run_ingestion().await + self.run_dispatch().await + self.run_apply().await;
            if handled == 0 {
                break;
            }
        }
    }
}

/// Broker that accepts nothing; receiving and settling still work
#[derive(Clone, Default)]
pub struct FailingBroker {
    inner: MemoryBroker,
}

#[async_trait]
impl QueueBroker for FailingBroker {
    async fn declare(&self, queue: &str) -> Result<()> {
        self.inner.declare(queue).await
    }

    async fn publish(&self, _queue: &str, _body: &str) -> Result<()> {
        Err(PipelineError::queue("broker unavailable"))
    }

    async fn publish_delayed(&self, _queue: &str, _body: &str, _delay: Duration) -> Result<()> {
        Err(PipelineError::queue("broker unavailable"))
    }

    async fn receive(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>> {
        self.inner.receive(queue, wait).await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.inner.ack(delivery).await
    }

    async fn nack(&self, delivery: &Delivery, requeue: bool) -> Result<()> {
        self.inner.nack(delivery, requeue).await
    }

    async fn recover(&self, queue: &str) -> Result<usize> {
        self.inner.recover(queue).await
    }

    async fn depth(&self, queue: &str) -> Result<QueueDepth> {
        self.inner.depth(queue).await
    }
}
