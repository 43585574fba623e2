//! Per-action duplicate suppression
//!
//! Entity types with a unique-within-action attribute (contacts: `email`) claim each
//! normalized value once per action in the shared cache. The first job to claim a
//! value proceeds; later jobs with the same value are skipped. Without a reachable
//! cache no job is ever treated as a duplicate.

use crate::config::DedupConfig;
use crate::core::models::{PushJob, dedup_field_for};
use crate::storage::cache::SharedCache;
use crate::utils::error::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a dedup claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// The entity type has no dedup attribute, the job lacks it, or the cache is unavailable
    NotApplicable,
    /// This job owns the value
    Unique,
    /// Another job of the same action already claimed the value
    Duplicate { field: &'static str, value: String },
}

impl DedupOutcome {
    /// Error text recorded on a skipped job
    pub fn skip_reason(&self) -> Option<String> {
        match self {
            DedupOutcome::Duplicate { field, value } => {
                Some(format!("Duplicate {}: {}", field, value))
            }
            _ => None,
        }
    }
}

pub struct DedupFilter {
    config: DedupConfig,
    cache: Option<Arc<dyn SharedCache>>,
}

impl DedupFilter {
    pub fn new(config: DedupConfig, cache: Option<Arc<dyn SharedCache>>) -> Self {
        Self { config, cache }
    }

    /// Cache key for one action and normalized value
    pub fn key(field: &str, action_id: &str, normalized: &str) -> String {
        format!("dedup:{}:{}:{}", field, action_id, normalized)
    }

    /// Trim and lowercase; blank values are not deduplicated
    pub fn normalize(value: &str) -> Option<String> {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
    }

    /// Claim the job's dedup value for its action
    pub async fn claim(&self, job: &PushJob) -> DedupOutcome {
        let cache = match (&self.cache, self.config.enabled) {
            (Some(cache), true) => cache,
            _ => return DedupOutcome::NotApplicable,
        };
        let Some(field) = dedup_field_for(&job.entity_type) else {
            return DedupOutcome::NotApplicable;
        };
        let Some(raw) = job.payload.get(field).and_then(value_text) else {
            return DedupOutcome::NotApplicable;
        };
        let Some(normalized) = Self::normalize(&raw) else {
            return DedupOutcome::NotApplicable;
        };

        let key = Self::key(field, &job.action_id, &normalized);
        match self.try_claim(cache.as_ref(), &key, &job.job_id).await {
            Ok(true) => DedupOutcome::Unique,
            Ok(false) => {
                debug!("Job {} duplicates {} {}", job.job_id, field, normalized);
                DedupOutcome::Duplicate {
                    field,
                    value: raw.trim().to_string(),
                }
            }
            Err(e) => {
                warn!(
                    "Dedup unavailable for job {}, processing without it: {}",
                    job.job_id, e
                );
                DedupOutcome::NotApplicable
            }
        }
    }

    /// SET NX EX; a job that finds its own id under the key still wins
    async fn try_claim(&self, cache: &dyn SharedCache, key: &str, job_id: &str) -> Result<bool> {
        if cache.set_nx_ex(key, job_id, self.config.ttl()).await? {
            return Ok(true);
        }
        let owner = cache.get(key).await?;
        Ok(owner.as_deref() == Some(job_id))
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
