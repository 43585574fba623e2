//! Pipeline configuration validators

use super::trait_def::Validate;
use crate::config::models::*;
use tracing::debug;

impl Validate for PipelineConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating pipeline configuration");

        self.database
            .validate()
            .map_err(|e| format!("Database config error: {}", e))?;
        self.redis
            .validate()
            .map_err(|e| format!("Redis config error: {}", e))?;
        self.queues
            .validate()
            .map_err(|e| format!("Queue config error: {}", e))?;
        self.rate_limit
            .validate()
            .map_err(|e| format!("Rate limit config error: {}", e))?;
        self.ingestion
            .validate()
            .map_err(|e| format!("Ingestion config error: {}", e))?;
        self.dedup
            .validate()
            .map_err(|e| format!("Dedup config error: {}", e))?;
        self.scheduler
            .validate()
            .map_err(|e| format!("Scheduler config error: {}", e))?;
        self.files
            .validate()
            .map_err(|e| format!("File storage config error: {}", e))?;

        // A batch larger than the window capacity could never be admitted
        if self.rate_limit.enabled && self.ingestion.batch_size > self.rate_limit.max_requests as usize
        {
            return Err(format!(
                "Ingestion batch size ({}) exceeds the rate limit capacity ({})",
                self.ingestion.batch_size, self.rate_limit.max_requests
            ));
        }

        Ok(())
    }
}

impl Validate for QueueConfig {
    fn validate(&self) -> Result<(), String> {
        let names = self.all();
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err("Queue names cannot be empty".to_string());
        }
        if names[0] == names[1] || names[1] == names[2] || names[0] == names[2] {
            return Err("Queue names must be distinct".to_string());
        }
        if self.consumer_id.trim().is_empty() {
            return Err("Consumer id cannot be empty".to_string());
        }
        if self.ingestion_prefetch == 0 {
            return Err("Ingestion prefetch must be greater than 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("Poll interval must be greater than 0".to_string());
        }
        if self.dispatch_retry.backoff.max_attempts == 0 {
            return Err("Dispatch max attempts must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.window_ms == 0 {
            return Err("Rate limit window must be greater than 0".to_string());
        }
        if self.max_requests == 0 {
            return Err("Rate limit capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for IngestionConfig {
    fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("Batch size must be greater than 0".to_string());
        }
        if self.id_field.trim().is_empty() {
            return Err("Identifier field cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Validate for DedupConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.ttl_secs == 0 {
            return Err("Dedup TTL must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for SchedulerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.interval_secs == 0 {
            return Err("Scheduler interval must be greater than 0".to_string());
        }
        Ok(())
    }
}
