//! Dispatch stage integration tests

#[cfg(test)]
mod tests {
    use crate::common::{ActionAssertions, CsvFixture, FailingBroker, TestPipeline};
    use bulk_actions::config::QueueConfig;
    use bulk_actions::core::models::{
        ActionStatus, ApplyMessage, DispatchMessage, JobStatus, decode, encode,
    };
    use bulk_actions::core::pipeline::{DispatchOutcome, DispatchStage};
    use bulk_actions::core::queue::{Disposition, MessageHandler, QueueBroker};
    use std::sync::Arc;
    use std::time::Duration;

    async fn ingested(pipeline: &TestPipeline, csv: &str) -> (String, DispatchMessage) {
        let action = pipeline.submit(csv).await;
        pipeline.run_ingestion().await;
        let mut batches = pipeline.broker.drain(&pipeline.queues().process_pushjob);
        assert_eq!(batches.len(), 1);
        (action.action_id, decode(&batches.remove(0)).unwrap())
    }

    fn apply_messages(pipeline: &TestPipeline) -> Vec<ApplyMessage> {
        pipeline
            .broker
            .drain(&pipeline.queues().push_entity)
            .iter()
            .map(|body| decode(body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_duplicate_emails_are_skipped() {
        let pipeline = TestPipeline::new().await;
        let csv = CsvFixture::contacts()
            .row(&["1", "Ada", "ada@example.com"])
            .row(&["2", "Ada again", " ADA@example.com "])
            .row(&["3", "Cy", "cy@example.com"])
            .build();
        let (action_id, batch) = ingested(&pipeline, &csv).await;

        let stage = DispatchStage::new(pipeline.ctx.clone());
        let outcome = stage.process(&batch).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Dispatched {
                promoted: 2,
                skipped: 1
            }
        );

        let skipped = pipeline
            .db
            .db()
            .find_job(&batch.job_ids[1])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(skipped.status, JobStatus::Skipped);
        assert_eq!(
            skipped.error_message.as_deref(),
            Some("Duplicate email: ADA@example.com")
        );

        let action = pipeline.action(&action_id).await;
        assert_eq!(action.skipped_count, 1);
        action.assert_consistent();

        let applies = apply_messages(&pipeline);
        assert_eq!(applies.len(), 1);
        let external: Vec<&str> = applies[0]
            .job_payloads
            .iter()
            .map(|p| p.external_id.as_str())
            .collect();
        assert_eq!(external, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_dedup_is_scoped_to_the_action() {
        let pipeline = TestPipeline::new().await;
        let csv = CsvFixture::contacts()
            .row(&["1", "Ada", "ada@example.com"])
            .build();
        let stage = DispatchStage::new(pipeline.ctx.clone());

        for _ in 0..2 {
            let (_, batch) = ingested(&pipeline, &csv).await;
            let outcome = stage.process(&batch).await.unwrap();
            assert_eq!(
                outcome,
                DispatchOutcome::Dispatched {
                    promoted: 1,
                    skipped: 0
                }
            );
        }
    }

    #[tokio::test]
    async fn test_dedup_fails_open_without_cache() {
        let pipeline = TestPipeline::without_cache(TestPipeline::test_config()).await;
        let csv = CsvFixture::contacts()
            .row(&["1", "Ada", "ada@example.com"])
            .row(&["2", "Ada again", "ada@example.com"])
            .build();
        let (_, batch) = ingested(&pipeline, &csv).await;

        let outcome = DispatchStage::new(pipeline.ctx.clone())
            .process(&batch)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Dispatched {
                promoted: 2,
                skipped: 0
            }
        );
    }

    #[tokio::test]
    async fn test_all_skipped_batch_still_reaches_apply() {
        let mut config = TestPipeline::test_config();
        config.ingestion.batch_size = 1;
        let pipeline = TestPipeline::with_config(config).await;
        let csv = CsvFixture::contacts()
            .row(&["1", "Ada", "ada@example.com"])
            .row(&["2", "Ada again", "ada@example.com"])
            .build();
        pipeline.submit(&csv).await;
        pipeline.run_ingestion().await;
        let batches = pipeline.broker.drain(&pipeline.queues().process_pushjob);
        assert_eq!(batches.len(), 2);

        let stage = DispatchStage::new(pipeline.ctx.clone());
        stage.process(&decode(&batches[0]).unwrap()).await.unwrap();
        let outcome = stage.process(&decode(&batches[1]).unwrap()).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Dispatched {
                promoted: 0,
                skipped: 1
            }
        );

        let applies = apply_messages(&pipeline);
        assert_eq!(applies.len(), 2);
        assert!(applies[1].job_payloads.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_action_is_ignored() {
        let pipeline = TestPipeline::new().await;
        let (action_id, batch) =
            ingested(&pipeline, &CsvFixture::numbered_contacts(2).build()).await;
        pipeline.db.db().fail_action(&action_id, "cancelled").await.unwrap();

        let outcome = DispatchStage::new(pipeline.ctx.clone())
            .process(&batch)
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(apply_messages(&pipeline).is_empty());

        let counts = pipeline.db.db().count_jobs_by_status(&action_id).await.unwrap();
        assert_eq!(counts.ready, 2);
    }

    #[tokio::test]
    async fn test_redelivered_batch_resends_processing_jobs() {
        let pipeline = TestPipeline::new().await;
        let (_, batch) = ingested(&pipeline, &CsvFixture::numbered_contacts(2).build()).await;
        let stage = DispatchStage::new(pipeline.ctx.clone());

        stage.process(&batch).await.unwrap();
        apply_messages(&pipeline);

        let again = stage.process(&batch).await.unwrap();
        assert_eq!(
            again,
            DispatchOutcome::Dispatched {
                promoted: 2,
                skipped: 0
            }
        );
        let job = pipeline
            .db
            .db()
            .find_job(&batch.job_ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_batch_is_deferred() {
        let mut config = TestPipeline::test_config();
        config.rate_limit.max_requests = 3;
        config.rate_limit.window_ms = 60_000;
        let pipeline = TestPipeline::with_config(config).await;
        let stage = DispatchStage::new(pipeline.ctx.clone());

        let (_, first) = ingested(&pipeline, &CsvFixture::numbered_contacts(2).build()).await;
        let (second_id, second) =
            ingested(&pipeline, &CsvFixture::numbered_contacts(2).build()).await;

        assert!(matches!(
            stage.process(&first).await.unwrap(),
            DispatchOutcome::Dispatched { promoted: 2, .. }
        ));
        let deferred = stage.process(&second).await.unwrap();
        let DispatchOutcome::Deferred { delay } = deferred else {
            panic!("expected deferral, got {:?}", deferred);
        };
        assert!(delay <= Duration::from_secs(60));

        let delayed = pipeline.broker.delayed(&pipeline.queues().process_pushjob);
        assert_eq!(delayed.len(), 1);
        assert_eq!(decode::<DispatchMessage>(&delayed[0].1).unwrap(), second);

        let counts = pipeline.db.db().count_jobs_by_status(&second_id).await.unwrap();
        assert_eq!(counts.ready, 2);
    }

    #[tokio::test]
    async fn test_repeated_failures_end_in_poison_queue() {
        let mut config = TestPipeline::test_config();
        config.queues.dispatch_retry.immediate_retries = 1;
        config.queues.dispatch_retry.backoff.max_attempts = 1;
        let pipeline = TestPipeline::with_config(config).await;
        let queue = pipeline.queues().process_pushjob.clone();
        let stage = DispatchStage::new(pipeline.ctx.clone());
        pipeline.db.db().connection().clone().close().await.unwrap();

        let message = DispatchMessage {
            action_id: "a1".to_string(),
            account_id: Some("acc".to_string()),
            entity_type: Some("Contact".to_string()),
            job_ids: vec!["j1".to_string()],
            attempt: 0,
        };
        pipeline
            .broker
            .publish(&queue, &encode(&message).unwrap())
            .await
            .unwrap();

        // attempt 0 retries immediately, attempt 1 is poisoned
        assert_eq!(pipeline.pump(&queue, &stage).await, 2);

        let poisoned = pipeline.broker.drain(&QueueConfig::poison_queue(&queue));
        assert_eq!(poisoned.len(), 1);
        let poisoned: DispatchMessage = decode(&poisoned[0]).unwrap();
        assert_eq!(poisoned.attempt, 2);
        assert_eq!(poisoned.job_ids, message.job_ids);
    }

    #[tokio::test]
    async fn test_failed_republish_requeues() {
        let pipeline = TestPipeline::new().await;
        let broker = Arc::new(FailingBroker::default());
        let stage = DispatchStage::new(pipeline.context_with_broker(broker));
        pipeline.db.db().connection().clone().close().await.unwrap();

        let message = DispatchMessage {
            action_id: "a1".to_string(),
            account_id: None,
            entity_type: None,
            job_ids: vec![],
            attempt: 0,
        };
        let queue = pipeline.queues().process_pushjob.clone();
        pipeline
            .broker
            .publish(&queue, &encode(&message).unwrap())
            .await
            .unwrap();
        let delivery = pipeline
            .broker
            .receive(&queue, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stage.handle(&delivery).await, Disposition::REQUEUE);
    }

    #[tokio::test]
    async fn test_action_status_untouched_by_dispatch() {
        let pipeline = TestPipeline::new().await;
        let (action_id, batch) =
            ingested(&pipeline, &CsvFixture::numbered_contacts(1).build()).await;
        DispatchStage::new(pipeline.ctx.clone())
            .process(&batch)
            .await
            .unwrap();
        pipeline
            .action(&action_id)
            .await
            .assert_status(ActionStatus::Processing);
    }
}
