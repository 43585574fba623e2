//! Per-record jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::PipelineError;

/// Field name to value, in source column order
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Ready,
    Processing,
    Success,
    Failed,
    Skipped,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Ready,
        JobStatus::Processing,
        JobStatus::Success,
        JobStatus::Failed,
        JobStatus::Skipped,
    ];

    /// Statuses that still need work
    pub const PENDING: [JobStatus; 2] = [JobStatus::Ready, JobStatus::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Ready => "READY",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
            JobStatus::Skipped => "SKIPPED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Skipped
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(JobStatus::Ready),
            "PROCESSING" => Ok(JobStatus::Processing),
            "SUCCESS" => Ok(JobStatus::Success),
            "FAILED" => Ok(JobStatus::Failed),
            "SKIPPED" => Ok(JobStatus::Skipped),
            other => Err(PipelineError::validation(format!(
                "Unknown job status: {}",
                other
            ))),
        }
    }
}

/// One per-record unit of work derived from a source row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushJob {
    pub job_id: String,
    pub action_id: String,
    pub account_id: String,
    pub entity_type: String,
    pub external_id: String,
    pub payload: Payload,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A job about to be inserted by ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct NewPushJob {
    pub action_id: String,
    pub account_id: String,
    pub entity_type: String,
    pub external_id: String,
    pub payload: Payload,
}

/// Job counts per status for one action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub ready: i64,
    pub processing: i64,
    pub success: i64,
    pub failed: i64,
    pub skipped: i64,
}

impl JobCounts {
    pub fn add(&mut self, status: JobStatus, count: i64) {
        match status {
            JobStatus::Ready => self.ready += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Success => self.success += count,
            JobStatus::Failed => self.failed += count,
            JobStatus::Skipped => self.skipped += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending() + self.terminal()
    }

    pub fn pending(&self) -> i64 {
        self.ready + self.processing
    }

    pub fn terminal(&self) -> i64 {
        self.success + self.failed + self.skipped
    }
}
