//! Configuration management for the pipeline
//!
//! This module handles loading, validation, and management of all pipeline configuration.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{PipelineError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct for the pipeline
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Pipeline configuration
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::Config(format!("Failed to read config file: {}", e)))?;

        let pipeline: PipelineConfig = serde_yaml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;

        let config = Self { pipeline };
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from environment variables (a `.env` file is honored)
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");
        let _ = dotenvy::dotenv();

        let pipeline = PipelineConfig::from_env()?;
        let config = Self { pipeline };

        config.validate()?;
        Ok(config)
    }

    pub fn database(&self) -> &DatabaseConfig {
        &self.pipeline.database
    }

    pub fn redis(&self) -> &RedisConfig {
        &self.pipeline.redis
    }

    pub fn queues(&self) -> &QueueConfig {
        &self.pipeline.queues
    }

    pub fn rate_limit(&self) -> &RateLimitConfig {
        &self.pipeline.rate_limit
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.pipeline.logging
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        self.pipeline.validate().map_err(PipelineError::Config)?;
        debug!("Configuration validation completed");
        Ok(())
    }

    /// Convert to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.pipeline)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize config to YAML: {}", e)))
    }
}
