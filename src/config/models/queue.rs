//! Queue configuration

use super::*;
use crate::utils::error::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue names and consumer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Ingestion queue (`{actionId}` messages)
    #[serde(default = "default_process_file_queue")]
    pub process_file: String,
    /// Dispatch queue (job id batches)
    #[serde(default = "default_process_pushjob_queue")]
    pub process_pushjob: String,
    /// Apply queue (job payload batches)
    #[serde(default = "default_push_entity_queue")]
    pub push_entity: String,
    /// Concurrent ingestion messages per consumer
    #[serde(default = "default_ingestion_prefetch")]
    pub ingestion_prefetch: usize,
    /// How long an idle consumer waits before polling again, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Redelivery policy for dispatch batches that fail unexpectedly
    #[serde(default)]
    pub dispatch_retry: RedeliveryConfig,
    /// Stable identity of this worker; owns its in-flight messages across restarts
    #[serde(default = "default_consumer_id")]
    pub consumer_id: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            process_file: default_process_file_queue(),
            process_pushjob: default_process_pushjob_queue(),
            push_entity: default_push_entity_queue(),
            ingestion_prefetch: default_ingestion_prefetch(),
            poll_interval_ms: default_poll_interval_ms(),
            dispatch_retry: RedeliveryConfig::default(),
            consumer_id: default_consumer_id(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// All queues the pipeline consumes from
    pub fn all(&self) -> [&str; 3] {
        [&self.process_file, &self.process_pushjob, &self.push_entity]
    }

    /// Poison queue paired with a work queue
    pub fn poison_queue(queue: &str) -> String {
        format!("{}.poison", queue)
    }
}

/// Bounded redelivery: a few immediate retries, then backoff, then the poison queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedeliveryConfig {
    /// Attempts republished without delay
    #[serde(default = "default_immediate_retries")]
    pub immediate_retries: u32,
    /// Backoff schedule; `max_attempts` bounds the total number of attempts
    #[serde(flatten)]
    pub backoff: RetryConfig,
}

impl Default for RedeliveryConfig {
    fn default() -> Self {
        Self {
            immediate_retries: default_immediate_retries(),
            backoff: RetryConfig::default(),
        }
    }
}

fn default_process_file_queue() -> String {
    "process_file_queue".to_string()
}

fn default_process_pushjob_queue() -> String {
    "process_pushjob_queue".to_string()
}

fn default_push_entity_queue() -> String {
    "push_entity_queue".to_string()
}

fn default_ingestion_prefetch() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_consumer_id() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "worker".to_string())
}

fn default_immediate_retries() -> u32 {
    2
}
