//! Main pipeline configuration

#![allow(missing_docs)]

use super::*;
use crate::utils::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Document store
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Shared cache and queue broker
    #[serde(default)]
    pub redis: RedisConfig,
    /// Queue names and consumer settings
    #[serde(default)]
    pub queues: QueueConfig,
    /// Per-account throughput limit
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// File ingestion
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Duplicate suppression
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Deferred action promotion
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Uploaded source files
    #[serde(default)]
    pub files: FileStorageConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Build a configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = env_var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Some(url) = env_var("REDIS_URL") {
            config.redis.url = url;
        }
        if let Some(enabled) = parse_env::<bool>("REDIS_ENABLED")? {
            config.redis.enabled = enabled;
        }
        if let Some(queue) = env_var("PROCESS_FILE_QUEUE") {
            config.queues.process_file = queue;
        }
        if let Some(queue) = env_var("PROCESS_PUSHJOB_QUEUE") {
            config.queues.process_pushjob = queue;
        }
        if let Some(queue) = env_var("PUSH_ENTITY_QUEUE") {
            config.queues.push_entity = queue;
        }
        if let Some(id) = env_var("WORKER_ID") {
            config.queues.consumer_id = id;
        }
        if let Some(window) = parse_env("RATE_LIMIT_WINDOW_MS")? {
            config.rate_limit.window_ms = window;
        }
        if let Some(max) = parse_env("RATE_LIMIT_MAX_REQUESTS")? {
            config.rate_limit.max_requests = max;
        }
        if let Some(delay) = parse_env("RATE_LIMIT_REQUEUE_DELAY_MS")? {
            config.rate_limit.requeue_delay_ms = delay;
        }
        if let Some(size) = parse_env("FILE_PROCESSING_BATCH_SIZE")? {
            config.ingestion.batch_size = size;
        }
        if let Some(interval) = parse_env("SCHEDULER_INTERVAL_SECS")? {
            config.scheduler.interval_secs = interval;
        }
        if let Some(dir) = env_var("UPLOAD_DIR") {
            config.files.upload_dir = dir;
        }
        if let Some(level) = env_var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = env_var("LOG_FORMAT") {
            config.logging.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            };
        }

        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| PipelineError::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(None),
    }
}

/// File ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Jobs buffered before a flush (insert + dispatch publish)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Column holding the external record identifier
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            id_field: default_id_field(),
        }
    }
}

fn default_id_field() -> String {
    "id".to_string()
}

/// Duplicate suppression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lifetime of a claimed value, in seconds
    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_dedup_ttl_secs(),
        }
    }
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_scheduler_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_scheduler_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
