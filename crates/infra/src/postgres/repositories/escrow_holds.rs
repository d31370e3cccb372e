use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{postgres_connection::PgPoolSquad, schema::escrow_holds};
use domain::{
    entities::escrow_holds::EscrowHoldEntity,
    repositories::escrow_holds::EscrowHoldRepository,
    value_objects::enums::escrow_states::EscrowState,
};

pub struct EscrowHoldPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EscrowHoldPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    fn load(conn: &mut diesel::PgConnection, order_id: Uuid) -> Result<Option<EscrowHoldEntity>> {
        let hold = escrow_holds::table
            .filter(escrow_holds::order_id.eq(order_id))
            .select(EscrowHoldEntity::as_select())
            .first::<EscrowHoldEntity>(conn)
            .optional()?;
        Ok(hold)
    }
}

#[async_trait]
impl EscrowHoldRepository for EscrowHoldPostgres {
    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<EscrowHoldEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        Self::load(&mut conn, order_id)
    }

    async fn mark_captured(&self, order_id: Uuid, captured_minor: i64) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(
            escrow_holds::table
                .filter(escrow_holds::order_id.eq(order_id))
                .filter(escrow_holds::state.eq(EscrowState::Authorized.as_str())),
        )
        .set((
            escrow_holds::state.eq(EscrowState::Captured.as_str()),
            escrow_holds::captured_minor.eq(captured_minor),
            escrow_holds::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        if affected == 1 {
            return Ok(());
        }

        // Replays land here; anything else is a state machine violation.
        match Self::load(&mut conn, order_id)? {
            Some(hold) if hold.captured_minor == captured_minor => Ok(()),
            Some(hold) => bail!(
                "hold for order {} is {} with captured {}, cannot record capture of {}",
                order_id,
                hold.state,
                hold.captured_minor,
                captured_minor
            ),
            None => bail!("no escrow hold for order {}", order_id),
        }
    }

    async fn record_refund_total(&self, order_id: Uuid, refunded_total_minor: i64) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<(), anyhow::Error, _>(|conn| {
            let affected = update(
                escrow_holds::table
                    .filter(escrow_holds::order_id.eq(order_id))
                    .filter(escrow_holds::state.eq(EscrowState::Captured.as_str()))
                    .filter(escrow_holds::refunded_minor.lt(refunded_total_minor))
                    .filter(escrow_holds::captured_minor.ge(refunded_total_minor)),
            )
            .set((
                escrow_holds::refunded_minor.eq(refunded_total_minor),
                escrow_holds::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;

            if affected == 0 {
                match Self::load(conn, order_id)? {
                    // Replayed receipt or webhook; the total is already in.
                    Some(hold) if hold.refunded_minor >= refunded_total_minor => return Ok(()),
                    Some(hold) => bail!(
                        "refund total {} does not fit hold for order {} (state {}, captured {}, refunded {})",
                        refunded_total_minor,
                        order_id,
                        hold.state,
                        hold.captured_minor,
                        hold.refunded_minor
                    ),
                    None => bail!("no escrow hold for order {}", order_id),
                }
            }

            // Fully unwound captures become terminal.
            update(
                escrow_holds::table
                    .filter(escrow_holds::order_id.eq(order_id))
                    .filter(escrow_holds::state.eq(EscrowState::Captured.as_str()))
                    .filter(escrow_holds::captured_minor.gt(0))
                    .filter(escrow_holds::refunded_minor.eq(escrow_holds::captured_minor)),
            )
            .set((
                escrow_holds::state.eq(EscrowState::Refunded.as_str()),
                escrow_holds::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;

            Ok(())
        })
    }

    async fn mark_released(&self, order_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(
            escrow_holds::table
                .filter(escrow_holds::order_id.eq(order_id))
                .filter(escrow_holds::state.eq(EscrowState::Captured.as_str())),
        )
        .set((
            escrow_holds::state.eq(EscrowState::ReleasedToSeller.as_str()),
            escrow_holds::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        if affected == 1 {
            return Ok(());
        }

        match Self::load(&mut conn, order_id)? {
            Some(hold) if hold.state == EscrowState::ReleasedToSeller.as_str() => Ok(()),
            Some(hold) => bail!(
                "hold for order {} is {}, cannot release to seller",
                order_id,
                hold.state
            ),
            None => bail!("no escrow hold for order {}", order_id),
        }
    }

    async fn mark_voided(&self, order_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(
            escrow_holds::table
                .filter(escrow_holds::order_id.eq(order_id))
                .filter(escrow_holds::state.eq(EscrowState::Authorized.as_str())),
        )
        .set((
            escrow_holds::state.eq(EscrowState::Voided.as_str()),
            escrow_holds::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        if affected == 1 {
            return Ok(());
        }

        match Self::load(&mut conn, order_id)? {
            Some(hold) if hold.state == EscrowState::Voided.as_str() => Ok(()),
            Some(hold) => bail!(
                "hold for order {} is {}, cannot void",
                order_id,
                hold.state
            ),
            None => bail!("no escrow hold for order {}", order_id),
        }
    }

    async fn bump_attempt_generation(&self, order_id: Uuid) -> Result<i32> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let generation = update(escrow_holds::table.filter(escrow_holds::order_id.eq(order_id)))
            .set((
                escrow_holds::attempt_generation.eq(escrow_holds::attempt_generation + 1),
                escrow_holds::updated_at.eq(Utc::now()),
            ))
            .returning(escrow_holds::attempt_generation)
            .get_result::<i32>(&mut conn)?;

        Ok(generation)
    }
}
