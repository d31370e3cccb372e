use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::orders;
use crate::value_objects::enums::order_statuses::OrderStatus;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = orders)]
pub struct OrderEntity {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub gig_id: Uuid,
    pub package_id: Option<Uuid>,
    pub currency: String,
    pub total_amount_minor: i64,
    pub status: String,
    pub delivery_days: i32,
    pub delivery_deadline: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub review_deadline: Option<DateTime<Utc>>,
    pub disputable_until: Option<DateTime<Utc>>,
    pub revision_count: i32,
    pub max_revisions: i32,
    pub provider_payment_ref: Option<String>,
    pub cancelled_by: Option<String>,
    pub cancel_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderEntity {
    /// The status column is free text at the storage layer; a value outside
    /// the known set means the row was tampered with and is surfaced as an
    /// internal error, never silently coerced.
    pub fn parse_status(&self) -> Result<OrderStatus> {
        OrderStatus::from_str(&self.status)
            .ok_or_else(|| anyhow!("order {} has unknown status {:?}", self.id, self.status))
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = orders)]
pub struct InsertOrderEntity {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub gig_id: Uuid,
    pub package_id: Option<Uuid>,
    pub currency: String,
    pub total_amount_minor: i64,
    pub status: String,
    pub delivery_days: i32,
    pub delivery_deadline: DateTime<Utc>,
    pub revision_count: i32,
    pub max_revisions: i32,
    pub provider_payment_ref: Option<String>,
    pub version: i64,
}
