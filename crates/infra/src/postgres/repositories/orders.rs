use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    OptionalExtension, RunQueryDsl,
    dsl::{exists, not},
    insert_into,
    prelude::*,
    update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{disputes, escrow_holds, order_line_items, orders},
};
use domain::{
    entities::{
        escrow_holds::InsertEscrowHoldEntity,
        order_line_items::{InsertOrderLineItemEntity, OrderLineItemEntity},
        orders::{InsertOrderEntity, OrderEntity},
    },
    repositories::orders::OrderRepository,
    value_objects::{
        enums::{dispute_resolutions::DisputeResolution, order_statuses::OrderStatus},
        orders::{ClaimOutcome, StatusWrite, TransitionOutcome, TransitionStamp},
    },
};

pub struct OrderPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderRepository for OrderPostgres {
    async fn create_order_with_hold(
        &self,
        order: InsertOrderEntity,
        line_items: Vec<InsertOrderLineItemEntity>,
        hold: InsertEscrowHoldEntity,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let order_id = conn.transaction::<Uuid, anyhow::Error, _>(|conn| {
            let order_id = insert_into(orders::table)
                .values(&order)
                .returning(orders::id)
                .get_result::<Uuid>(conn)?;

            insert_into(order_line_items::table)
                .values(&line_items)
                .execute(conn)?;

            insert_into(escrow_holds::table)
                .values(&hold)
                .execute(conn)?;

            Ok(order_id)
        })?;

        Ok(order_id)
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = orders::table
            .filter(orders::id.eq(order_id))
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_provider_ref(&self, provider_ref: String) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = orders::table
            .filter(orders::provider_payment_ref.eq(provider_ref))
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_line_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItemEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let items = order_line_items::table
            .filter(order_line_items::order_id.eq(order_id))
            .select(OrderLineItemEntity::as_select())
            .order(order_line_items::created_at.asc())
            .load::<OrderLineItemEntity>(&mut conn)?;

        Ok(items)
    }

    async fn claim_transition(
        &self,
        order_id: Uuid,
        expected_version: i64,
        expected_status: String,
    ) -> Result<ClaimOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let claimed_version = update(
            orders::table
                .filter(orders::id.eq(order_id))
                .filter(orders::version.eq(expected_version))
                .filter(orders::status.eq(expected_status)),
        )
        .set((
            orders::version.eq(orders::version + 1),
            orders::updated_at.eq(Utc::now()),
        ))
        .returning(orders::version)
        .get_result::<i64>(&mut conn)
        .optional()?;

        Ok(match claimed_version {
            Some(version) => ClaimOutcome::Claimed { version },
            None => ClaimOutcome::Conflict,
        })
    }

    async fn transition_status(&self, write: StatusWrite) -> Result<TransitionOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let affected = match write.stamp {
            TransitionStamp::None => update(
                orders::table
                    .filter(orders::id.eq(write.order_id))
                    .filter(orders::version.eq(write.expected_version))
                    .filter(orders::status.eq(write.from.as_str())),
            )
            .set((
                orders::status.eq(write.to.as_str()),
                orders::version.eq(orders::version + 1),
                orders::updated_at.eq(now),
            ))
            .execute(&mut conn)?,
            TransitionStamp::Delivered {
                delivered_at,
                review_deadline,
                disputable_until,
            } => update(
                orders::table
                    .filter(orders::id.eq(write.order_id))
                    .filter(orders::version.eq(write.expected_version))
                    .filter(orders::status.eq(write.from.as_str())),
            )
            .set((
                orders::status.eq(write.to.as_str()),
                orders::version.eq(orders::version + 1),
                orders::updated_at.eq(now),
                orders::delivered_at.eq(delivered_at),
                orders::review_deadline.eq(review_deadline),
                orders::disputable_until.eq(disputable_until),
            ))
            .execute(&mut conn)?,
            // The slot check rides in the WHERE clause so the status change
            // and the counter bump stay one atomic statement.
            TransitionStamp::RevisionRequested => update(
                orders::table
                    .filter(orders::id.eq(write.order_id))
                    .filter(orders::version.eq(write.expected_version))
                    .filter(orders::status.eq(write.from.as_str()))
                    .filter(orders::revision_count.lt(orders::max_revisions)),
            )
            .set((
                orders::status.eq(write.to.as_str()),
                orders::version.eq(orders::version + 1),
                orders::updated_at.eq(now),
                orders::revision_count.eq(orders::revision_count + 1),
            ))
            .execute(&mut conn)?,
            TransitionStamp::Cancelled {
                cancelled_by,
                cancel_reason,
            } => update(
                orders::table
                    .filter(orders::id.eq(write.order_id))
                    .filter(orders::version.eq(write.expected_version))
                    .filter(orders::status.eq(write.from.as_str())),
            )
            .set((
                orders::status.eq(write.to.as_str()),
                orders::version.eq(orders::version + 1),
                orders::updated_at.eq(now),
                orders::cancelled_by.eq(cancelled_by),
                orders::cancel_reason.eq(cancel_reason),
            ))
            .execute(&mut conn)?,
        };

        Ok(if affected == 1 {
            TransitionOutcome::Applied
        } else {
            TransitionOutcome::Conflict
        })
    }

    async fn list_due_for_auto_accept(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let unresolved_dispute = disputes::table
            .filter(disputes::order_id.eq(orders::id))
            .filter(disputes::resolution.eq(DisputeResolution::Pending.as_str()));

        let due = orders::table
            .filter(orders::status.eq(OrderStatus::Delivered.as_str()))
            .filter(orders::review_deadline.le(now))
            .filter(not(exists(unresolved_dispute)))
            .select(OrderEntity::as_select())
            .order(orders::review_deadline.asc())
            .limit(limit)
            .load::<OrderEntity>(&mut conn)?;

        Ok(due)
    }
}
