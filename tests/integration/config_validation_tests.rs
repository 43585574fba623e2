//! Configuration validation integration tests
//!
//! These tests verify that a complete pipeline configuration validates correctly
//! and fails with a pointed message for each kind of invalid setting.

#[cfg(test)]
mod tests {
    use bulk_actions::config::{Config, PipelineConfig, Validate};
    use bulk_actions::utils::error::PipelineError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.database.url = "postgresql://localhost/bulk".to_string();
        config
    }

    fn error_of(config: &PipelineConfig) -> String {
        config.validate().expect_err("config should be rejected")
    }

    // ==================== Pipeline ====================

    #[test]
    fn test_valid_pipeline_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_batch_larger_than_capacity_is_rejected() {
        let mut config = valid_config();
        config.rate_limit.max_requests = 50;
        config.ingestion.batch_size = 51;
        assert!(error_of(&config).contains("exceeds the rate limit capacity"));
    }

    #[test]
    fn test_batch_capacity_ignored_when_rate_limit_disabled() {
        let mut config = valid_config();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;
        config.ingestion.batch_size = 500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = valid_config();
        config.ingestion.batch_size = 0;
        let error = error_of(&config);
        assert!(error.starts_with("Ingestion config error"));
    }

    // ==================== Queues ====================

    #[test]
    fn test_queue_names_must_be_distinct() {
        let mut config = valid_config();
        config.queues.push_entity = config.queues.process_file.clone();
        assert!(error_of(&config).contains("distinct"));
    }

    #[test]
    fn test_queue_names_cannot_be_blank() {
        let mut config = valid_config();
        config.queues.process_pushjob = "  ".to_string();
        assert!(error_of(&config).contains("cannot be empty"));
    }

    #[test]
    fn test_dispatch_needs_at_least_one_attempt() {
        let mut config = valid_config();
        config.queues.dispatch_retry.backoff.max_attempts = 0;
        assert!(error_of(&config).contains("max attempts"));
    }

    // ==================== Storage ====================

    #[test]
    fn test_unsupported_database_scheme() {
        let mut config = valid_config();
        config.database.url = "mysql://localhost/bulk".to_string();
        assert!(error_of(&config).contains("PostgreSQL and SQLite"));
    }

    #[test]
    fn test_redis_url_scheme_checked_only_when_enabled() {
        let mut config = valid_config();
        config.redis.url = "http://localhost:6379".to_string();
        assert!(error_of(&config).contains("redis://"));

        config.redis.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dedup_ttl_required_when_enabled() {
        let mut config = valid_config();
        config.dedup.ttl_secs = 0;
        assert!(error_of(&config).starts_with("Dedup config error"));
    }

    // ==================== Loading ====================

    #[tokio::test]
    async fn test_yaml_file_with_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
database:
  url: "sqlite::memory:"
queues:
  process_file: "files"
  process_pushjob: "jobs"
  push_entity: "entities"
  dispatch_retry:
    immediate_retries: 1
    max_attempts: 4
rate_limit:
  max_requests: 20
ingestion:
  batch_size: 20
  id_field: "external_id"
logging:
  format: json
"#,
        )
        .unwrap();

        let config = Config::from_file(file.path()).await.unwrap();
        assert!(config.database().is_in_memory());
        assert_eq!(config.queues().dispatch_retry.immediate_retries, 1);
        assert_eq!(config.queues().dispatch_retry.backoff.max_attempts, 4);
        assert_eq!(config.pipeline.ingestion.id_field, "external_id");
        assert_eq!(config.rate_limit().max_requests, 20);
    }

    #[tokio::test]
    async fn test_invalid_yaml_file_is_a_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"queues:\n  process_file: [not, a, string]\n")
            .unwrap();

        let result = Config::from_file(file.path()).await;
        match result {
            Err(PipelineError::Config(message)) => {
                assert!(message.starts_with("Failed to parse config"))
            }
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }
}
