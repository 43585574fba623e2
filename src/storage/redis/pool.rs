//! Redis connection management
//!
//! One multiplexed connection is shared by every clone of the pool. Callers that see
//! a dropped connection may ask for a `reconnect`, which re-runs the connect backoff.

use crate::config::RedisConfig;
use crate::utils::error::{PipelineError, Result, RetryPolicy};
use crate::utils::logging::sanitize_url;
use redis::{Client, aio::MultiplexedConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Redis connection pool
#[derive(Debug, Clone)]
pub struct RedisPool {
    pub(crate) client: Client,
    pub(crate) connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    pub(crate) config: RedisConfig,
}

impl RedisPool {
    /// Connect, retrying with exponential backoff
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        info!("Creating Redis connection pool");
        debug!("Redis URL: {}", sanitize_url(&config.url));

        let client = Client::open(config.url.as_str()).map_err(PipelineError::Redis)?;
        let pool = Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            config: config.clone(),
        };
        pool.reconnect().await?;

        info!("Redis connection pool created successfully");
        Ok(pool)
    }

    /// Replace the current connection with a fresh one
    pub async fn reconnect(&self) -> Result<()> {
        let policy = RetryPolicy::new(self.config.connect_retry.clone());
        let timeout = Duration::from_secs(self.config.connection_timeout.max(1));

        let connection = policy
            .call(|| async {
                match tokio::time::timeout(
                    timeout,
                    self.client.get_multiplexed_async_connection(),
                )
                .await
                {
                    Ok(result) => result.map_err(PipelineError::Redis),
                    Err(_) => Err(PipelineError::cache(format!(
                        "Timed out connecting to {}",
                        sanitize_url(&self.config.url)
                    ))),
                }
            })
            .await?;

        *self.connection.write().await = Some(connection);
        debug!("Redis connection established");
        Ok(())
    }

    /// Get a handle on the shared connection
    pub(crate) async fn get_connection(&self) -> Result<MultiplexedConnection> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or_else(|| PipelineError::cache("Redis connection is closed"))
    }

    /// Run a command, reconnecting once if the connection was dropped
    pub(crate) async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.get_connection().await?;
        match op(conn).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_connection_dropped() || e.is_io_error() => {
                warn!("Redis connection lost ({}), reconnecting", e);
                self.reconnect().await?;
                let conn = self.get_connection().await?;
                op(conn).await.map_err(PipelineError::Redis)
            }
            Err(e) => Err(PipelineError::Redis(e)),
        }
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        debug!("Performing Redis health check");
        let _: String = self
            .run(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        debug!("Redis health check passed");
        Ok(())
    }

    /// Drop the shared connection; later commands fail until `reconnect`
    pub async fn close(&self) -> Result<()> {
        info!("Closing Redis connection pool");
        self.connection.write().await.take();
        info!("Redis connection pool closed");
        Ok(())
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}
