//! Contact target store

use super::TargetStore;
use crate::core::models::{ContactRecord, EntityType, JobPayload, Payload};
use crate::storage::database::Database;
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

const FIXED_FIELDS: [&str; 5] = ["name", "email", "status", "age", "city"];

pub struct ContactStore {
    db: Arc<Database>,
    id_field: String,
}

impl ContactStore {
    pub fn new(db: Arc<Database>, id_field: &str) -> Self {
        Self {
            db,
            id_field: id_field.to_string(),
        }
    }

    /// Split a payload into the fixed contact columns and extra attributes
    pub fn record_from(&self, job: &JobPayload) -> Result<ContactRecord> {
        let payload = &job.payload;
        let attributes: serde_json::Map<String, Value> = payload
            .iter()
            .filter(|(key, _)| {
                key.as_str() != self.id_field && !FIXED_FIELDS.contains(&key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(ContactRecord {
            external_id: job.external_id.clone(),
            account_id: job.account_id.clone(),
            name: text_field(payload, "name"),
            email: text_field(payload, "email"),
            status: text_field(payload, "status"),
            age: age_field(payload)?,
            city: text_field(payload, "city"),
            attributes,
        })
    }
}

#[async_trait]
impl TargetStore for ContactStore {
    fn entity_type(&self) -> EntityType {
        EntityType::Contact
    }

    async fn upsert(&self, job: &JobPayload, at: DateTime<Utc>) -> Result<()> {
        let record = self.record_from(job)?;
        self.db.upsert_contact(&record, &job.action_id, at).await?;
        Ok(())
    }
}

/// Non-blank text value; empty cells leave the column untouched
fn text_field(payload: &Payload, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn invalid_age(value: impl std::fmt::Display) -> PipelineError {
    PipelineError::target(format!("Invalid age: {}", value))
}

fn age_field(payload: &Payload) -> Result<Option<i32>> {
    match payload.get("age") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| invalid_age(n)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<i32>().map(Some).map_err(|_| invalid_age(s)),
        Some(other) => Err(invalid_age(other)),
    }
}
