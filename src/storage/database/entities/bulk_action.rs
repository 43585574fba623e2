use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bulk action database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "bulk_actions")]
pub struct Model {
    /// Action ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning account
    pub account_id: String,

    /// Action kind (BULK_UPDATE)
    pub action_type: String,

    /// Target entity type
    pub entity_type: String,

    /// Action status
    pub status: String,

    pub original_file_name: Option<String>,

    /// Location of the uploaded source file
    pub file_path: Option<String>,

    /// Rows streamed from the source file
    pub total_entities: i64,

    pub processed_entities: i64,

    pub success_count: i64,

    pub failed_count: i64,

    pub skipped_count: i64,

    /// Rows rejected during ingestion (no identifier)
    pub rejected_rows: i64,

    /// Deferred start time
    pub scheduled_at: Option<DateTimeWithTimeZone>,

    pub processing_started_at: Option<DateTimeWithTimeZone>,

    pub processing_completed_at: Option<DateTimeWithTimeZone>,

    /// Set when the source file has been fully read
    pub ingested_at: Option<DateTimeWithTimeZone>,

    pub error_message: Option<String>,

    pub created_by: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

/// Bulk action entity relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One action has many jobs
    #[sea_orm(has_many = "super::push_job::Entity")]
    PushJobs,
}

impl Related<super::push_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PushJobs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
