use crate::core::models::ContactRecord;
use crate::utils::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::debug;
use uuid::Uuid;

use super::super::entities::{self, contact};
use super::convert::{now, to_db_time};
use super::types::SeaOrmDatabase;

fn merge_attributes(
    existing: Option<serde_json::Value>,
    updates: &serde_json::Map<String, serde_json::Value>,
) -> Option<serde_json::Value> {
    let mut merged = match existing {
        Some(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    for (key, value) in updates {
        merged.insert(key.clone(), value.clone());
    }
    (!merged.is_empty()).then_some(serde_json::Value::Object(merged))
}

impl SeaOrmDatabase {
    /// Insert or update a contact keyed by (external id, account id)
    ///
    /// Concurrent calls for the same key all succeed: an insert that loses the race
    /// becomes an update of the winner's row.
    pub async fn upsert_contact(
        &self,
        record: &ContactRecord,
        action_id: &str,
        at: DateTime<Utc>,
    ) -> Result<contact::Model> {
        if let Some(model) = self
            .find_contact(&record.account_id, &record.external_id)
            .await?
        {
            return self.update_contact(model, record, action_id, at).await;
        }

        debug!("Creating contact {}", record.external_id);
        let inserted = self.insert_contact(record, action_id, at).await?;
        let model = self
            .find_contact(&record.account_id, &record.external_id)
            .await?
            .ok_or_else(|| PipelineError::not_found(format!("contact {}", record.external_id)))?;
        if inserted > 0 {
            return Ok(model);
        }
        debug!("Contact {} created concurrently", record.external_id);
        self.update_contact(model, record, action_id, at).await
    }

    /// Insert unless a row with the same key exists; returns the number of rows written
    async fn insert_contact(
        &self,
        record: &ContactRecord,
        action_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let created_at = now();
        let active = contact::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            external_id: Set(record.external_id.clone()),
            account_id: Set(record.account_id.clone()),
            name: Set(record.name.clone()),
            email: Set(record.email.clone()),
            status: Set(record.status.clone()),
            age: Set(record.age),
            city: Set(record.city.clone()),
            attributes: Set(merge_attributes(None, &record.attributes)),
            last_action_id: Set(Some(action_id.to_string())),
            last_action_at: Set(Some(to_db_time(at))),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        };
        entities::Contact::insert(active)
            .on_conflict(
                OnConflict::columns([contact::Column::ExternalId, contact::Column::AccountId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(PipelineError::Database)
    }

    async fn update_contact(
        &self,
        model: contact::Model,
        record: &ContactRecord,
        action_id: &str,
        at: DateTime<Utc>,
    ) -> Result<contact::Model> {
        debug!("Updating contact {}", record.external_id);
        let attributes = merge_attributes(model.attributes.clone(), &record.attributes);
        let mut active: contact::ActiveModel = model.into();
        if let Some(name) = &record.name {
            active.name = Set(Some(name.clone()));
        }
        if let Some(email) = &record.email {
            active.email = Set(Some(email.clone()));
        }
        if let Some(status) = &record.status {
            active.status = Set(Some(status.clone()));
        }
        if let Some(age) = record.age {
            active.age = Set(Some(age));
        }
        if let Some(city) = &record.city {
            active.city = Set(Some(city.clone()));
        }
        active.attributes = Set(attributes);
        active.last_action_id = Set(Some(action_id.to_string()));
        active.last_action_at = Set(Some(to_db_time(at)));
        active.updated_at = Set(now());
        active.update(&self.db).await.map_err(PipelineError::Database)
    }

    /// Find a contact by its account-scoped external id
    pub async fn find_contact(
        &self,
        account_id: &str,
        external_id: &str,
    ) -> Result<Option<contact::Model>> {
        entities::Contact::find()
            .filter(contact::Column::AccountId.eq(account_id))
            .filter(contact::Column::ExternalId.eq(external_id))
            .one(&self.db)
            .await
            .map_err(PipelineError::Database)
    }

    /// Number of contacts stored for an account
    pub async fn count_contacts(&self, account_id: &str) -> Result<u64> {
        entities::Contact::find()
            .filter(contact::Column::AccountId.eq(account_id))
            .count(&self.db)
            .await
            .map_err(PipelineError::Database)
    }
}
