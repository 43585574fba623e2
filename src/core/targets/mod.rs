//! Target stores written by the apply stage

mod contact;

pub use contact::ContactStore;

use crate::core::models::{EntityType, JobPayload};
use crate::storage::database::Database;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Upsert-capable store for one entity type
#[async_trait]
pub trait TargetStore: Send + Sync {
    fn entity_type(&self) -> EntityType;

    /// Write one job's payload, keyed by (external id, account id)
    async fn upsert(&self, job: &JobPayload, at: DateTime<Utc>) -> Result<()>;
}

/// Entity type name to store
#[derive(Default, Clone)]
pub struct TargetRegistry {
    stores: HashMap<&'static str, Arc<dyn TargetStore>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every store backed by the primary database
    pub fn with_database(db: Arc<Database>, id_field: &str) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ContactStore::new(db, id_field)));
        registry
    }

    pub fn register(&mut self, store: Arc<dyn TargetStore>) {
        self.stores.insert(store.entity_type().as_str(), store);
    }

    pub fn get(&self, entity_type: &str) -> Option<Arc<dyn TargetStore>> {
        self.stores.get(entity_type).cloned()
    }
}
