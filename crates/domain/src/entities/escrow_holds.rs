use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::escrow_holds;
use crate::value_objects::enums::escrow_states::EscrowState;

/// One hold per order, created when the authorization succeeds at checkout.
/// `captured_minor` and `refunded_minor` mirror the provider's cumulative
/// bookkeeping for the hold.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = escrow_holds)]
pub struct EscrowHoldEntity {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider_ref: String,
    pub amount_minor: i64,
    pub captured_minor: i64,
    pub refunded_minor: i64,
    pub state: String,
    pub attempt_generation: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscrowHoldEntity {
    pub fn parse_state(&self) -> Result<EscrowState> {
        EscrowState::from_str(&self.state)
            .ok_or_else(|| anyhow!("escrow hold {} has unknown state {:?}", self.id, self.state))
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = escrow_holds)]
pub struct InsertEscrowHoldEntity {
    pub order_id: Uuid,
    pub provider_ref: String,
    pub amount_minor: i64,
    pub captured_minor: i64,
    pub refunded_minor: i64,
    pub state: String,
    pub attempt_generation: i32,
}
