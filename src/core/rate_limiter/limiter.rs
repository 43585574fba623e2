//! Fixed-window limiter over the shared cache

use super::types::RateLimitResult;
use crate::config::RateLimitConfig;
use crate::storage::cache::SharedCache;
use crate::utils::current_timestamp_millis;
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Rate limiter implementation
pub struct RateLimiter {
    config: RateLimitConfig,
    cache: Option<Arc<dyn SharedCache>>,
}

impl RateLimiter {
    /// Create a new rate limiter; `None` means no shared cache, so every check passes
    pub fn new(config: RateLimitConfig, cache: Option<Arc<dyn SharedCache>>) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counter key for one account and window
    pub fn window_key(account_id: &str, window_start: u64) -> String {
        format!("rate_limit:{}:{}", account_id, window_start)
    }

    /// Try to consume `units` from the account's current window
    ///
    /// Cache errors admit the batch.
    pub async fn check(&self, account_id: &str, units: u32) -> RateLimitResult {
        let limit = self.config.max_requests;
        let cache = match (&self.cache, self.config.enabled) {
            (Some(cache), true) => cache,
            _ => return RateLimitResult::unlimited(limit),
        };

        match self
            .check_at(cache.as_ref(), account_id, units, current_timestamp_millis())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    "Rate limiter unavailable for account {}, allowing batch: {}",
                    account_id, e
                );
                RateLimitResult::unlimited(limit)
            }
        }
    }

    async fn check_at(
        &self,
        cache: &dyn SharedCache,
        account_id: &str,
        units: u32,
        now_ms: u64,
    ) -> Result<RateLimitResult> {
        let window_ms = self.config.window_ms.max(1);
        let limit = i64::from(self.config.max_requests);
        let units = i64::from(units);
        let window_start = now_ms / window_ms * window_ms;
        let key = Self::window_key(account_id, window_start);

        let current = cache.get_counter(&key).await?;
        if current + units > limit {
            let retry_after = self.retry_after(cache, &key, now_ms, window_start).await?;
            debug!(
                "Rate limited account {}: {} + {} > {}",
                account_id, current, units, limit
            );
            return Ok(self.denied(current, retry_after));
        }

        let total = cache.incr_by(&key, units).await?;
        if total == units {
            cache.expire(&key, Duration::from_millis(window_ms)).await?;
        }

        if total > limit {
            // Lost a race with another worker
            let current = cache.decr_by(&key, units).await?;
            let retry_after = self.retry_after(cache, &key, now_ms, window_start).await?;
            debug!(
                "Rate limited account {} after increment: {} > {}",
                account_id, total, limit
            );
            return Ok(self.denied(current, retry_after));
        }

        Ok(RateLimitResult {
            allowed: true,
            current_count: clamp_u32(total),
            limit: self.config.max_requests,
            remaining: clamp_u32(limit - total),
            retry_after: None,
        })
    }

    /// Remaining window time, from the counter's expiry when it has one
    async fn retry_after(
        &self,
        cache: &dyn SharedCache,
        key: &str,
        now_ms: u64,
        window_start: u64,
    ) -> Result<Duration> {
        if let Some(ttl) = cache.ttl(key).await? {
            return Ok(ttl);
        }
        let window_ms = self.config.window_ms.max(1);
        let elapsed = now_ms.saturating_sub(window_start);
        Ok(Duration::from_millis(window_ms.saturating_sub(elapsed)))
    }

    fn denied(&self, current: i64, retry_after: Duration) -> RateLimitResult {
        let limit = i64::from(self.config.max_requests);
        RateLimitResult {
            allowed: false,
            current_count: clamp_u32(current),
            limit: self.config.max_requests,
            remaining: clamp_u32(limit - current),
            retry_after: Some(retry_after),
        }
    }

    #[cfg(test)]
    pub(super) async fn check_with_clock(
        &self,
        account_id: &str,
        units: u32,
        now_ms: u64,
    ) -> Result<RateLimitResult> {
        let cache = self
            .cache
            .as_ref()
            .ok_or_else(|| crate::utils::error::PipelineError::cache("no cache"))?;
        self.check_at(cache.as_ref(), account_id, units, now_ms).await
    }
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}
