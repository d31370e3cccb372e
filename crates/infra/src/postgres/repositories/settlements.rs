use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{postgres_connection::PgPoolSquad, schema::settlements};
use domain::{
    entities::settlements::{InsertSettlementEntity, SettlementEntity},
    repositories::settlements::SettlementRepository,
    value_objects::enums::payout_statuses::PayoutStatus,
};

pub struct SettlementPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SettlementPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SettlementRepository for SettlementPostgres {
    async fn upsert_for_order(&self, settlement: InsertSettlementEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<Uuid, anyhow::Error, _>(|conn| {
            let existing = settlements::table
                .filter(settlements::order_id.eq(settlement.order_id))
                .select(SettlementEntity::as_select())
                .first::<SettlementEntity>(conn)
                .optional()?;

            match existing {
                // The split is frozen once the payout left pending.
                Some(row) if row.payout_status != PayoutStatus::Pending.as_str() => Ok(row.id),
                Some(row) => {
                    update(settlements::table.filter(settlements::id.eq(row.id)))
                        .set((
                            settlements::gross_minor.eq(settlement.gross_minor),
                            settlements::fee_minor.eq(settlement.fee_minor),
                            settlements::seller_earnings_minor
                                .eq(settlement.seller_earnings_minor),
                            settlements::fee_bps.eq(settlement.fee_bps),
                            settlements::fee_policy_version
                                .eq(settlement.fee_policy_version.clone()),
                            settlements::computed_at.eq(settlement.computed_at),
                            settlements::updated_at.eq(Utc::now()),
                        ))
                        .execute(conn)?;
                    Ok(row.id)
                }
                None => {
                    let id = insert_into(settlements::table)
                        .values(&settlement)
                        .returning(settlements::id)
                        .get_result::<Uuid>(conn)?;
                    Ok(id)
                }
            }
        })
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<SettlementEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = settlements::table
            .filter(settlements::order_id.eq(order_id))
            .select(SettlementEntity::as_select())
            .first::<SettlementEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn record_payout_initiated(&self, order_id: Uuid, transfer_ref: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            settlements::table
                .filter(settlements::order_id.eq(order_id))
                .filter(settlements::payout_status.eq(PayoutStatus::Pending.as_str())),
        )
        .set((
            settlements::payout_ref.eq(transfer_ref),
            settlements::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_payout_completed(&self, order_id: Uuid, transfer_ref: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(
            settlements::table
                .filter(settlements::order_id.eq(order_id))
                .filter(settlements::payout_status.ne(PayoutStatus::Completed.as_str())),
        )
        .set((
            settlements::payout_status.eq(PayoutStatus::Completed.as_str()),
            settlements::payout_ref.eq(transfer_ref),
            settlements::payout_error.eq(None::<String>),
            settlements::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        if affected == 1 {
            return Ok(());
        }

        let exists = settlements::table
            .filter(settlements::order_id.eq(order_id))
            .select(settlements::id)
            .first::<Uuid>(&mut conn)
            .optional()?;
        if exists.is_none() {
            bail!("no settlement for order {}", order_id);
        }

        // Already completed; replayed confirmation.
        Ok(())
    }

    async fn mark_payout_failed(&self, order_id: Uuid, reason: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            settlements::table
                .filter(settlements::order_id.eq(order_id))
                .filter(settlements::payout_status.ne(PayoutStatus::Completed.as_str())),
        )
        .set((
            settlements::payout_status.eq(PayoutStatus::Failed.as_str()),
            settlements::payout_error.eq(reason),
            settlements::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(())
    }
}
