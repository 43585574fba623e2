//! Contact records written by the apply stage

use serde::{Deserialize, Serialize};

/// Fields of one contact upsert; `None` leaves the stored column untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub external_id: String,
    pub account_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub age: Option<i32>,
    pub city: Option<String>,
    /// Remaining payload fields, merged into the stored attributes
    pub attributes: serde_json::Map<String, serde_json::Value>,
}
