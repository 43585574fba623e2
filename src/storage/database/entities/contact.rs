use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Contact database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "contacts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Identifier from the account's own system
    pub external_id: String,

    pub account_id: String,

    pub name: Option<String>,

    pub email: Option<String>,

    pub status: Option<String>,

    pub age: Option<i32>,

    pub city: Option<String>,

    /// Payload fields outside the fixed columns
    pub attributes: Option<Json>,

    /// Last bulk action that wrote this contact
    pub last_action_id: Option<String>,

    pub last_action_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
