use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::seller_payout_profiles;

/// Mapping from a seller to their payout account at the provider. Rows are
/// written by the onboarding service; this engine only reads them when it is
/// time to transfer earnings.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = seller_payout_profiles)]
pub struct PayoutProfileEntity {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub provider_account_ref: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
