//! Storage layer for the pipeline
//!
//! This module provides data persistence, the shared cache and source file storage.

/// Shared cache abstraction
pub mod cache;
/// Database storage module
pub mod database;
/// File storage module
pub mod files;
/// Redis module
pub mod redis;

use crate::config::PipelineConfig;
use crate::core::queue::{MemoryBroker, QueueBroker, RedisBroker};
use crate::utils::error::Result;
use cache::{MemoryCache, SharedCache};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Every storage backend the workers share
#[derive(Clone)]
pub struct StorageLayer {
    /// Database connection pool
    pub database: Arc<database::Database>,
    /// Redis connection (absent when Redis is disabled)
    pub redis: Option<redis::RedisPool>,
    /// Source file storage
    pub files: Arc<files::LocalFileStore>,
    cache: Arc<dyn SharedCache>,
}

/// Health of each storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageHealthStatus {
    pub database: bool,
    pub redis: bool,
    pub files: bool,
    pub overall: bool,
}

impl StorageLayer {
    /// Connect every backend
    pub async fn new(config: &PipelineConfig) -> Result<Self> {
        info!("Initializing storage layer");

        debug!("Connecting to database");
        let database = Arc::new(database::Database::new(&config.database).await?);

        let redis = if config.redis.enabled {
            debug!("Connecting to Redis");
            Some(redis::RedisPool::connect(&config.redis).await?)
        } else {
            warn!("Redis disabled: queues, rate limiting and dedup are local to this process");
            None
        };
        let cache: Arc<dyn SharedCache> = match &redis {
            Some(pool) => Arc::new(pool.clone()),
            None => Arc::new(MemoryCache::new()),
        };

        debug!("Initializing file storage");
        let files = Arc::new(files::LocalFileStore::new(&config.files.upload_dir).await?);

        info!("Storage layer initialized successfully");
        Ok(Self {
            database,
            redis,
            files,
            cache,
        })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.database.migrate().await
    }

    /// Cache for the rate limiter and dedup filter: Redis, or one in-process cache
    pub fn shared_cache(&self) -> Arc<dyn SharedCache> {
        self.cache.clone()
    }

    /// Queue broker over Redis, or an in-process broker when Redis is disabled
    pub fn broker(&self, config: &PipelineConfig) -> Arc<dyn QueueBroker> {
        match &self.redis {
            Some(pool) => Arc::new(RedisBroker::new(
                pool.clone(),
                config.queues.poll_interval(),
                config.queues.consumer_id.clone(),
            )),
            None => Arc::new(MemoryBroker::new()),
        }
    }

    /// Health check for all storage backends
    pub async fn health_check(&self) -> StorageHealthStatus {
        let database = match self.database.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Database health check failed: {}", e);
                false
            }
        };

        let redis = match &self.redis {
            Some(pool) => match pool.health_check().await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Redis health check failed: {}", e);
                    false
                }
            },
            None => true,
        };

        let files = self.files.base_path().is_dir();
        if !files {
            warn!(
                "Upload directory {} is missing",
                self.files.base_path().display()
            );
        }

        StorageHealthStatus {
            database,
            redis,
            files,
            overall: database && redis && files,
        }
    }

    /// Close all connections
    pub async fn close(&self) -> Result<()> {
        info!("Closing storage connections");
        if let Some(redis) = &self.redis {
            redis.close().await?;
        }
        self.database.close().await?;
        info!("Storage connections closed");
        Ok(())
    }
}
