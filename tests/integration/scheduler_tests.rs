//! Scheduler integration tests

#[cfg(test)]
mod tests {
    use crate::common::{ActionAssertions, ActionFactory, CsvFixture, FailingBroker, TestPipeline};
    use bulk_actions::core::models::{ActionStatus, IngestionMessage, decode};
    use bulk_actions::core::pipeline::{Scheduler, SweepReport};
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    async fn scheduled(pipeline: &TestPipeline, offset: Duration) -> String {
        let file = pipeline
            .upload(&CsvFixture::numbered_contacts(2).build())
            .await;
        pipeline
            .service
            .create_action(ActionFactory::scheduled(file, Utc::now() + offset))
            .await
            .unwrap()
            .action_id
    }

    #[tokio::test]
    async fn test_due_actions_are_started() {
        let pipeline = TestPipeline::new().await;
        let due = scheduled(&pipeline, Duration::minutes(-1)).await;
        let later = scheduled(&pipeline, Duration::hours(1)).await;

        let report = Scheduler::new(pipeline.ctx.clone()).run_once().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                due: 1,
                started: 1,
                failed: 0
            }
        );

        let action = pipeline.action(&due).await;
        action.assert_status(ActionStatus::Pending);
        assert!(action.processing_started_at.is_some());
        pipeline
            .action(&later)
            .await
            .assert_status(ActionStatus::Scheduled);

        let queued = pipeline.broker.drain(&pipeline.queues().process_file);
        assert_eq!(queued.len(), 1);
        let message: IngestionMessage = decode(&queued[0]).unwrap();
        assert_eq!(message.action_id, due);
    }

    #[tokio::test]
    async fn test_started_action_runs_to_completion() {
        let pipeline = TestPipeline::new().await;
        let due = scheduled(&pipeline, Duration::seconds(-5)).await;

        Scheduler::new(pipeline.ctx.clone()).run_once().await.unwrap();
        pipeline.run_until_idle().await;

        let action = pipeline.action(&due).await;
        crate::common::assert_completed(&action);
        action.assert_counts(2, 0, 0);
    }

    #[tokio::test]
    async fn test_second_sweep_finds_nothing() {
        let pipeline = TestPipeline::new().await;
        scheduled(&pipeline, Duration::minutes(-1)).await;
        let scheduler = Scheduler::new(pipeline.ctx.clone());

        scheduler.run_once().await.unwrap();
        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_publish_failure_is_recorded_per_action() {
        let pipeline = TestPipeline::new().await;
        let first = scheduled(&pipeline, Duration::minutes(-2)).await;
        let second = scheduled(&pipeline, Duration::minutes(-1)).await;
        let ctx = pipeline.context_with_broker(Arc::new(FailingBroker::default()));

        let report = Scheduler::new(ctx).run_once().await.unwrap();
        assert_eq!(report.due, 2);
        assert_eq!(report.failed, 2);

        for action_id in [first, second] {
            let action = pipeline.action(&action_id).await;
            action.assert_status(ActionStatus::Failed);
            let message = action.error_message.unwrap();
            assert!(
                message.starts_with("Failed to start scheduled processing:"),
                "{}",
                message
            );
        }
    }

    #[tokio::test]
    async fn test_spawned_scheduler_stops_on_shutdown() {
        let mut config = TestPipeline::test_config();
        config.scheduler.interval_secs = 1;
        let pipeline = TestPipeline::with_config(config).await;
        let due = scheduled(&pipeline, Duration::minutes(-1)).await;

        let (tx, rx) = tokio::sync::watch::channel(false);
        let task = Scheduler::new(pipeline.ctx.clone()).spawn(rx);

        // The first tick fires immediately
        for _ in 0..50 {
            if pipeline.action(&due).await.status == ActionStatus::Pending {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        pipeline.action(&due).await.assert_status(ActionStatus::Pending);

        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
