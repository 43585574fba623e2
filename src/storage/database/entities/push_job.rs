use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-record job database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "push_jobs")]
pub struct Model {
    /// Job ID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning action
    pub action_id: String,

    pub account_id: String,

    pub entity_type: String,

    /// Record identifier taken from the source row
    pub external_id: String,

    /// Source row as a JSON object
    pub payload: Json,

    /// Job status
    pub status: String,

    pub error_message: Option<String>,

    pub processed_at: Option<DateTimeWithTimeZone>,

    /// Times the job was promoted for apply
    pub attempts: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

/// Push job entity relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Job belongs to action
    #[sea_orm(
        belongs_to = "super::bulk_action::Entity",
        from = "Column::ActionId",
        to = "super::bulk_action::Column::Id"
    )]
    BulkAction,
}

impl Related<super::bulk_action::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BulkAction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
