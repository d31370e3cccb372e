use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{postgres_connection::PgPoolSquad, schema::seller_payout_profiles};
use domain::repositories::payout_profiles::PayoutProfileRepository;

/// Read-only view of payout onboarding. The onboarding service owns writes.
pub struct PayoutProfilePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PayoutProfilePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PayoutProfileRepository for PayoutProfilePostgres {
    async fn find_active_account_ref(&self, seller_id: Uuid) -> Result<Option<String>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let account_ref = seller_payout_profiles::table
            .filter(seller_payout_profiles::seller_id.eq(seller_id))
            .filter(seller_payout_profiles::status.eq("active"))
            .select(seller_payout_profiles::provider_account_ref)
            .first::<String>(&mut conn)
            .optional()?;

        Ok(account_ref)
    }
}
