//! Full pipeline runs over the in-memory broker and cache

#[cfg(test)]
mod tests {
    use super::super::wait_for_terminal;
    use crate::common::{ActionAssertions, ActionFactory, CsvFixture, TestPipeline, assert_completed};
    use bulk_actions::Pipeline;
    use bulk_actions::core::models::{ActionStatus, JobFilter, JobStatus, Pagination};
    use chrono::Utc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_csv_with_rejected_row_completes() {
        let pipeline = TestPipeline::new().await;
        let running = Pipeline::new(pipeline.ctx.clone());
        running.prepare().await.unwrap();
        let handle = running.start();

        let csv = CsvFixture::contacts()
            .row(&["A", "Ada", "ada@example.com"])
            .row(&["", "Nobody", "nobody@example.com"])
            .row(&["C", "Cy", "cy@example.com"])
            .build();
        let action = pipeline.submit(&csv).await;

        let action = wait_for_terminal(pipeline.db.db(), &action.action_id, TIMEOUT).await;
        handle.shutdown().await;

        assert_completed(&action);
        assert_eq!(action.total_entities, 3);
        action.assert_counts(2, 1, 0);

        let stats = pipeline.service.action_stats(&action.action_id).await.unwrap();
        assert_eq!(stats.jobs_created, 2);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failed_count, 1);

        let logs = pipeline
            .service
            .action_logs(&action.action_id, &JobFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert!(logs.items.iter().all(|job| job.status == JobStatus::Success));
        assert_eq!(pipeline.db.db().count_contacts(ActionFactory::ACCOUNT).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_many_batches_with_duplicates() {
        let mut config = TestPipeline::test_config();
        config.ingestion.batch_size = 7;
        let pipeline = TestPipeline::with_config(config).await;
        let running = Pipeline::new(pipeline.ctx.clone());
        running.prepare().await.unwrap();
        let handle = running.start();

        let mut csv = CsvFixture::numbered_contacts(40);
        for i in 1..=5 {
            csv = csv.row(&[
                &format!("dup-{}", i),
                "Again",
                &format!("contact{}@example.com", i),
            ]);
        }
        let action = pipeline.submit(&csv.build()).await;

        let action = wait_for_terminal(pipeline.db.db(), &action.action_id, TIMEOUT).await;
        handle.shutdown().await;

        assert_completed(&action);
        assert_eq!(action.total_entities, 45);
        action.assert_counts(40, 0, 5);
    }

    #[tokio::test]
    async fn test_scheduled_action_runs_with_scheduler_enabled() {
        let mut config = TestPipeline::test_config();
        config.scheduler.enabled = true;
        config.scheduler.interval_secs = 1;
        let pipeline = TestPipeline::with_config(config).await;
        let running = Pipeline::new(pipeline.ctx.clone());
        running.prepare().await.unwrap();
        let handle = running.start();

        let file = pipeline
            .upload(&CsvFixture::numbered_contacts(3).build())
            .await;
        let action = pipeline
            .service
            .create_action(ActionFactory::scheduled(file, Utc::now()))
            .await
            .unwrap();
        action.assert_status(ActionStatus::Scheduled);

        let action = wait_for_terminal(pipeline.db.db(), &action.action_id, TIMEOUT).await;
        handle.shutdown().await;

        assert_completed(&action);
        action.assert_counts(3, 0, 0);
    }

    #[tokio::test]
    async fn test_shutdown_with_idle_consumers() {
        let pipeline = TestPipeline::new().await;
        let running = Pipeline::new(pipeline.ctx.clone());
        running.prepare().await.unwrap();
        let handle = running.start();

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("pipeline should stop promptly");
    }
}
