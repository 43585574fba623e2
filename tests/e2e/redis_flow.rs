//! Pipeline runs over Redis
//!
//! Required environment variables:
//! - REDIS_URL: a disposable Redis instance

#[cfg(test)]
mod tests {
    use super::super::wait_for_terminal;
    use crate::common::{ActionAssertions, ActionFactory, CsvFixture, TestDatabase, assert_completed};
    use bulk_actions::config::RedisConfig;
    use bulk_actions::core::models::{ActionStatus, JobStatus};
    use bulk_actions::core::pipeline::PipelineContext;
    use bulk_actions::core::queue::{Disposition, QueueBroker, RedisBroker};
    use bulk_actions::services::BulkActionService;
    use bulk_actions::storage::cache::SharedCache;
    use bulk_actions::storage::files::{FileStore, LocalFileStore};
    use bulk_actions::storage::redis::RedisPool;
    use bulk_actions::Pipeline;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn redis_pool() -> RedisPool {
        let config = RedisConfig {
            url: std::env::var("REDIS_URL").expect("REDIS_URL"),
            ..RedisConfig::default()
        };
        RedisPool::connect(&config).await.expect("redis")
    }

    fn unique(name: &str) -> String {
        format!("test-{}-{}", name, uuid::Uuid::new_v4().simple())
    }

    #[tokio::test]
    #[ignore]
    async fn test_broker_requeue_and_delay() {
        crate::skip_without_env!("REDIS_URL");
        let broker = RedisBroker::new(redis_pool().await, Duration::from_millis(10), "w1");
        let queue = unique("queue");
        broker.declare(&queue).await.unwrap();

        broker.publish(&queue, "first").await.unwrap();
        let delivery = broker
            .receive(&queue, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.body, "first");
        broker.settle(&delivery, Disposition::REQUEUE).await.unwrap();

        let again = broker
            .receive(&queue, Duration::from_millis(200))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.body, "first");
        broker.ack(&again).await.unwrap();

        broker
            .publish_delayed(&queue, "later", Duration::from_millis(150))
            .await
            .unwrap();
        assert!(broker.receive(&queue, Duration::ZERO).await.unwrap().is_none());
        tokio::time::sleep(Duration::from_millis(200)).await;
        let later = broker
            .receive(&queue, Duration::from_millis(200))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(later.body, "later");
        broker.ack(&later).await.unwrap();

        let depth = broker.depth(&queue).await.unwrap();
        assert_eq!(depth.ready + depth.in_flight, 0);
    }

    #[tokio::test]
    #[ignore]
    async fn test_recover_leaves_peer_in_flight_messages() {
        crate::skip_without_env!("REDIS_URL");
        let pool = redis_pool().await;
        let busy = RedisBroker::new(pool.clone(), Duration::from_millis(10), unique("busy"));
        let restarted = RedisBroker::new(pool, Duration::from_millis(10), unique("restarted"));
        let queue = unique("queue");
        busy.declare(&queue).await.unwrap();

        busy.publish(&queue, "held").await.unwrap();
        let held = busy.receive(&queue, Duration::ZERO).await.unwrap().unwrap();
        restarted.publish(&queue, "own").await.unwrap();
        let _own = restarted
            .receive(&queue, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(restarted.recover(&queue).await.unwrap(), 1);
        assert_eq!(busy.depth(&queue).await.unwrap().in_flight, 1);
        let again = restarted
            .receive(&queue, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.body, "own");
        restarted.ack(&again).await.unwrap();

        busy.ack(&held).await.unwrap();
        let depth = busy.depth(&queue).await.unwrap();
        assert_eq!(depth.ready + depth.in_flight, 0);
    }

    #[tokio::test]
    #[ignore]
    async fn test_full_run_over_redis() {
        crate::skip_without_env!("REDIS_URL");
        let pool = redis_pool().await;
        let db = TestDatabase::new().await;
        let dir = TempDir::new().unwrap();
        let files = Arc::new(LocalFileStore::new(dir.path()).await.unwrap());

        let mut config = crate::common::TestPipeline::test_config();
        config.queues.process_file = unique("files");
        config.queues.process_pushjob = unique("jobs");
        config.queues.push_entity = unique("entities");
        let broker = Arc::new(RedisBroker::new(
            pool.clone(),
            config.queues.poll_interval(),
            config.queues.consumer_id.clone(),
        ));
        let cache: Arc<dyn SharedCache> = Arc::new(pool);
        let ctx = PipelineContext::new(config, db.db_arc(), broker, files.clone(), Some(cache));

        let running = Pipeline::new(ctx.clone());
        running.prepare().await.unwrap();
        let handle = running.start();

        let csv = CsvFixture::contacts()
            .row(&["A", "Ada", "ada@example.com"])
            .row(&["B", "Ada again", "ADA@example.com"])
            .row(&["C", "Cy", "cy@example.com"])
            .build();
        let file = files.store("contacts.csv", csv.as_bytes()).await.unwrap();
        let service = BulkActionService::new(&ctx);
        let action = service
            .create_action(ActionFactory::contacts(file))
            .await
            .unwrap();
        action.assert_status(ActionStatus::Pending);

        let action = wait_for_terminal(db.db(), &action.action_id, Duration::from_secs(15)).await;
        handle.shutdown().await;

        assert_completed(&action);
        action.assert_counts(2, 0, 1);

        let logs = service
            .action_logs(&action.action_id, &Default::default(), Default::default())
            .await
            .unwrap();
        let skipped: Vec<_> = logs
            .items
            .iter()
            .filter(|job| job.status == JobStatus::Skipped)
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].external_id, "B");
    }
}
