//! Queue message bodies
//!
//! All messages travel as camelCase JSON.

use serde::{Deserialize, Serialize};

use super::job::{Payload, PushJob};
use crate::utils::error::Result;

/// Ingestion queue: start reading the action's file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionMessage {
    pub action_id: String,
}

/// Dispatch queue: one batch of job ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchMessage {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub job_ids: Vec<String>,
    /// Redeliveries after unexpected failures
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempt: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Apply queue: jobs promoted to PROCESSING by dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyMessage {
    pub action_id: String,
    pub account_id: String,
    pub entity_type: String,
    pub job_payloads: Vec<JobPayload>,
}

/// Everything apply needs to write one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub job_id: String,
    pub action_id: String,
    pub account_id: String,
    pub entity_type: String,
    pub external_id: String,
    pub payload: Payload,
}

impl From<&PushJob> for JobPayload {
    fn from(job: &PushJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            action_id: job.action_id.clone(),
            account_id: job.account_id.clone(),
            entity_type: job.entity_type.clone(),
            external_id: job.external_id.clone(),
            payload: job.payload.clone(),
        }
    }
}

/// Encode a message body
pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a message body
pub fn decode<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(body)?)
}
