use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::settlements;

/// Frozen record of the fee split applied when an order settled. Written
/// before capture is treated as committed, stamped with the fee policy
/// version so later policy changes never touch historical orders.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = settlements)]
pub struct SettlementEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub gross_minor: i64,
    pub fee_minor: i64,
    pub seller_earnings_minor: i64,
    pub fee_bps: i32,
    pub fee_policy_version: String,
    pub payout_status: String,
    pub payout_ref: Option<String>,
    pub payout_error: Option<String>,
    pub computed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = settlements)]
pub struct InsertSettlementEntity {
    pub order_id: Uuid,
    pub gross_minor: i64,
    pub fee_minor: i64,
    pub seller_earnings_minor: i64,
    pub fee_bps: i32,
    pub fee_policy_version: String,
    pub payout_status: String,
    pub computed_at: DateTime<Utc>,
}
