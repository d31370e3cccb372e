use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::disputes;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = disputes)]
pub struct DisputeEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub opened_by: Uuid,
    pub reason_code: String,
    pub description: String,
    pub evidence_refs: serde_json::Value,
    pub status: String,
    pub resolution: String,
    pub refund_percent: Option<i32>,
    pub admin_notes: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DisputeEntity {
    /// Evidence is stored as a JSON array of opaque references (URLs, file
    /// keys). Anything malformed is dropped rather than failing a read path.
    pub fn evidence_refs_list(&self) -> Vec<String> {
        self.evidence_refs
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = disputes)]
pub struct InsertDisputeEntity {
    pub order_id: Uuid,
    pub opened_by: Uuid,
    pub reason_code: String,
    pub description: String,
    pub evidence_refs: serde_json::Value,
    pub status: String,
    pub resolution: String,
}
