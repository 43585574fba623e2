//! Target entity types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::PipelineError;

/// Business entities a bulk action may target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Contact,
    Company,
    Lead,
    Opportunity,
    Task,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Contact,
        EntityType::Company,
        EntityType::Lead,
        EntityType::Opportunity,
        EntityType::Task,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Contact => "Contact",
            EntityType::Company => "Company",
            EntityType::Lead => "Lead",
            EntityType::Opportunity => "Opportunity",
            EntityType::Task => "Task",
        }
    }

    /// Attribute that must be unique within one action, if any
    pub fn dedup_field(&self) -> Option<&'static str> {
        match self {
            EntityType::Contact => Some("email"),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|entity| entity.as_str() == s)
            .ok_or_else(|| PipelineError::validation("Invalid entity type."))
    }
}

/// Dedup attribute of an entity type name, if the type is known and carries one
pub fn dedup_field_for(entity_type: &str) -> Option<&'static str> {
    entity_type
        .parse::<EntityType>()
        .ok()
        .and_then(|entity| entity.dedup_field())
}
