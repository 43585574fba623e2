//! In-process cache backed by `DashMap`

use super::SharedCache;
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Writes between sweeps of expired entries
const SWEEP_EVERY: u64 = 1000;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Single-process `SharedCache`
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    writes: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        removed
    }

    /// Keys held in memory, expired or not
    #[cfg(test)]
    pub(crate) fn stored(&self) -> usize {
        self.entries.len()
    }

    // Must not be called while an entry guard is held.
    fn record_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY == 0 {
            self.purge_expired();
        }
    }

    fn live(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let entry = self.entries.get(key)?.clone();
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, e| e.is_expired(now));
            return None;
        }
        Some(entry)
    }

    fn add(&self, key: &str, delta: i64) -> Result<i64> {
        let next = self.apply(key, delta)?;
        self.record_write();
        Ok(next)
    }

    fn apply(&self, key: &str, delta: i64) -> Result<i64> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert(CacheEntry {
            value: "0".to_string(),
            expires_at: None,
        });
        if entry.is_expired(now) {
            *entry = CacheEntry {
                value: "0".to_string(),
                expires_at: None,
            };
        }
        let current: i64 = entry.value.parse().map_err(|_| {
            PipelineError::cache(format!("value at {} is not an integer", key))
        })?;
        let next = current + delta;
        entry.value = next.to_string();
        Ok(next)
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn get_counter(&self, key: &str) -> Result<i64> {
        Ok(self
            .live(key)
            .and_then(|e| e.value.parse().ok())
            .unwrap_or(0))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.add(key, delta)
    }

    async fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        self.add(key, -delta)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.expires_at = Some(now + ttl);
            }
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        Ok(self
            .live(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live(key).map(|e| e.value))
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let fresh = CacheEntry {
            value: value.to_string(),
            expires_at: Some(now + ttl),
        };
        let stored = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(fresh);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                true
            }
        };
        if stored {
            self.record_write();
        }
        Ok(stored)
    }
}
