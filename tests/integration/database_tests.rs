//! Database integration tests
//!
//! Tests database operations using real in-memory SQLite database.

#[cfg(test)]
mod tests {
    use crate::common::{ActionFactory, JobFactory, TestDatabase};
    use bulk_actions::core::models::{
        ActionStatus, ContactRecord, CounterDelta, JobFilter, JobStatus, Pagination,
    };
    use bulk_actions::storage::database::IngestionSummary;
    use chrono::{Duration, Utc};

    async fn processing_action(db: &TestDatabase, id: &str) {
        db.db()
            .create_action(
                id,
                &ActionFactory::contacts(ActionFactory::detached_file()),
                ActionStatus::Pending,
            )
            .await
            .unwrap();
        assert!(db.db().claim_for_ingestion(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_database_health_check() {
        let db = TestDatabase::new().await;
        crate::assert_ok!(db.db().health_check().await);
    }

    #[tokio::test]
    async fn test_migration_is_repeatable() {
        let db = TestDatabase::new().await;
        crate::assert_ok!(db.db().migrate().await);
    }

    #[tokio::test]
    async fn test_claim_for_ingestion_only_once() {
        let db = TestDatabase::new().await;
        processing_action(&db, "a1").await;

        assert!(!db.db().claim_for_ingestion("a1").await.unwrap());
        let action = db.db().get_action("a1").await.unwrap();
        assert_eq!(action.status, ActionStatus::Processing);
        assert!(action.processing_started_at.is_some());
    }

    #[tokio::test]
    async fn test_terminal_actions_do_not_move() {
        let db = TestDatabase::new().await;
        processing_action(&db, "a1").await;

        assert!(db.db().fail_action("a1", "boom").await.unwrap());
        assert!(!db.db().fail_action("a1", "again").await.unwrap());
        assert!(!db.db().complete_action("a1").await.unwrap());

        let action = db.db().get_action("a1").await.unwrap();
        assert_eq!(action.status, ActionStatus::Failed);
        assert_eq!(action.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_completion_requires_finished_ingestion() {
        let db = TestDatabase::new().await;
        processing_action(&db, "a1").await;

        assert!(!db.db().complete_action("a1").await.unwrap());

        db.db()
            .record_ingestion(
                "a1",
                &IngestionSummary {
                    total_rows: 3,
                    rejected_rows: 1,
                    jobs_created: 2,
                },
            )
            .await
            .unwrap();
        assert!(db.db().complete_action("a1").await.unwrap());
        assert!(!db.db().complete_action("a1").await.unwrap());

        let action = db.db().get_action("a1").await.unwrap();
        assert_eq!(action.status, ActionStatus::Completed);
        assert_eq!(action.total_entities, 3);
        assert_eq!(action.rejected_rows, 1);
        assert_eq!(action.failed_count, 1);
        assert_eq!(action.processed_entities, 1);
        assert!(action.processing_completed_at.is_some());
    }

    #[tokio::test]
    async fn test_counter_increments_accumulate() {
        let db = TestDatabase::new().await;
        processing_action(&db, "a1").await;

        for _ in 0..2 {
            db.db()
                .increment_action_counters(
                    "a1",
                    CounterDelta {
                        success: 2,
                        failed: 1,
                        skipped: 1,
                    },
                )
                .await
                .unwrap();
        }

        let action = db.db().get_action("a1").await.unwrap();
        assert_eq!(action.success_count, 4);
        assert_eq!(action.failed_count, 2);
        assert_eq!(action.skipped_count, 2);
        assert_eq!(action.processed_entities, 8);
    }

    #[tokio::test]
    async fn test_job_lifecycle_is_guarded() {
        let db = TestDatabase::new().await;
        processing_action(&db, "a1").await;
        let ids = db
            .db()
            .insert_jobs(&[
                JobFactory::contact("a1", "e1", "one@example.com"),
                JobFactory::contact("a1", "e2", "two@example.com"),
            ])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        assert!(db.db().promote_job(&ids[0]).await.unwrap());
        assert!(!db.db().promote_job(&ids[0]).await.unwrap());
        assert!(db.db().finish_job(&ids[0], JobStatus::Success, None).await.unwrap());
        assert!(!db.db().finish_job(&ids[0], JobStatus::Failed, Some("late")).await.unwrap());

        assert!(db.db().skip_job(&ids[1], "Duplicate email: two@example.com").await.unwrap());
        assert!(!db.db().promote_job(&ids[1]).await.unwrap());

        let first = db.db().find_job(&ids[0]).await.unwrap().unwrap();
        assert_eq!(first.status, JobStatus::Success);
        assert_eq!(first.attempts, 1);
        assert!(first.processed_at.is_some());
        assert!(first.error_message.is_none());

        let counts = db.db().count_jobs_by_status("a1").await.unwrap();
        assert_eq!(counts.success, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.pending(), 0);
    }

    #[tokio::test]
    async fn test_finish_job_rejects_non_terminal_outcome() {
        let db = TestDatabase::new().await;
        processing_action(&db, "a1").await;
        let ids = db
            .db()
            .insert_jobs(&[JobFactory::contact("a1", "e1", "one@example.com")])
            .await
            .unwrap();
        db.db().promote_job(&ids[0]).await.unwrap();

        crate::assert_err!(db.db().finish_job(&ids[0], JobStatus::Ready, None).await);
    }

    #[tokio::test]
    async fn test_job_error_text_is_truncated() {
        let db = TestDatabase::new().await;
        processing_action(&db, "a1").await;
        let ids = db
            .db()
            .insert_jobs(&[JobFactory::contact("a1", "e1", "one@example.com")])
            .await
            .unwrap();
        db.db().promote_job(&ids[0]).await.unwrap();

        let long = "x".repeat(400);
        db.db()
            .finish_job(&ids[0], JobStatus::Failed, Some(&long))
            .await
            .unwrap();
        let job = db.db().find_job(&ids[0]).await.unwrap().unwrap();
        assert_eq!(job.error_message.unwrap().chars().count(), 255);
    }

    #[tokio::test]
    async fn test_list_jobs_filters() {
        let db = TestDatabase::new().await;
        processing_action(&db, "a1").await;
        let jobs: Vec<_> = (0..5)
            .map(|i| JobFactory::contact("a1", &format!("e{}", i), &format!("{}@example.com", i)))
            .collect();
        let ids = db.db().insert_jobs(&jobs).await.unwrap();
        db.db().promote_job(&ids[0]).await.unwrap();

        let ready = db
            .db()
            .list_jobs(
                "a1",
                &JobFilter {
                    status: Some(JobStatus::Ready),
                    ..JobFilter::default()
                },
                Pagination::new(1, 3),
            )
            .await
            .unwrap();
        assert_eq!(ready.total, 4);
        assert_eq!(ready.items.len(), 3);
        assert_eq!(ready.total_pages, 2);

        let by_external = db
            .db()
            .list_jobs(
                "a1",
                &JobFilter {
                    external_id: Some("e3".to_string()),
                    ..JobFilter::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_external.total, 1);
        assert_eq!(by_external.items[0].external_id, "e3");
    }

    #[tokio::test]
    async fn test_due_scheduled_actions() {
        let db = TestDatabase::new().await;
        let past = ActionFactory::scheduled(
            ActionFactory::detached_file(),
            Utc::now() - Duration::minutes(5),
        );
        let future = ActionFactory::scheduled(
            ActionFactory::detached_file(),
            Utc::now() + Duration::hours(1),
        );
        db.db()
            .create_action("due", &past, ActionStatus::Scheduled)
            .await
            .unwrap();
        db.db()
            .create_action("later", &future, ActionStatus::Scheduled)
            .await
            .unwrap();

        let due = db.db().find_due_scheduled_actions(Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].action_id, "due");

        assert!(db.db().promote_scheduled_action("due").await.unwrap());
        assert!(!db.db().promote_scheduled_action("due").await.unwrap());
        let action = db.db().get_action("due").await.unwrap();
        assert_eq!(action.status, ActionStatus::Pending);
    }

    #[tokio::test]
    async fn test_contact_upsert_merges_fields() {
        let db = TestDatabase::new().await;
        let mut attributes = serde_json::Map::new();
        attributes.insert("tier".to_string(), serde_json::json!("gold"));
        let first = ContactRecord {
            external_id: "e1".to_string(),
            account_id: "acc".to_string(),
            name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            status: None,
            age: Some(36),
            city: None,
            attributes,
        };
        db.db().upsert_contact(&first, "a1", Utc::now()).await.unwrap();

        let update = ContactRecord {
            name: None,
            email: None,
            age: None,
            city: Some("London".to_string()),
            attributes: serde_json::Map::new(),
            ..first.clone()
        };
        db.db().upsert_contact(&update, "a2", Utc::now()).await.unwrap();

        let stored = db.db().find_contact("acc", "e1").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Ada"));
        assert_eq!(stored.age, Some(36));
        assert_eq!(stored.city.as_deref(), Some("London"));
        assert_eq!(stored.last_action_id.as_deref(), Some("a2"));
        assert_eq!(stored.attributes.unwrap()["tier"], "gold");
        assert_eq!(db.db().count_contacts("acc").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_contact_upserts_all_succeed() {
        let db = TestDatabase::new().await;
        let record = |name: &str| ContactRecord {
            external_id: "e1".to_string(),
            account_id: "acc".to_string(),
            name: Some(name.to_string()),
            email: None,
            status: None,
            age: None,
            city: None,
            attributes: serde_json::Map::new(),
        };
        let (a, b, c, d) = (record("A"), record("B"), record("C"), record("D"));

        let results = tokio::join!(
            db.db().upsert_contact(&a, "a1", Utc::now()),
            db.db().upsert_contact(&b, "a2", Utc::now()),
            db.db().upsert_contact(&c, "a3", Utc::now()),
            db.db().upsert_contact(&d, "a4", Utc::now()),
        );
        let ids = [
            results.0.unwrap().id,
            results.1.unwrap().id,
            results.2.unwrap().id,
            results.3.unwrap().id,
        ];

        assert!(ids.iter().all(|id| id == &ids[0]));
        assert_eq!(db.db().count_contacts("acc").await.unwrap(), 1);
    }
}
