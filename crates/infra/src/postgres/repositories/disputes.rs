use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    OptionalExtension, RunQueryDsl,
    dsl::exists,
    insert_into,
    prelude::*,
    select, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::{postgres_connection::PgPoolSquad, schema::disputes};
use domain::{
    entities::disputes::{DisputeEntity, InsertDisputeEntity},
    repositories::disputes::DisputeRepository,
    value_objects::{
        disputes::{DisputeOpenOutcome, ResolveWriteOutcome},
        enums::{dispute_resolutions::DisputeResolution, dispute_statuses::DisputeStatus},
    },
};

pub struct DisputePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl DisputePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl DisputeRepository for DisputePostgres {
    async fn open(&self, dispute: InsertDisputeEntity) -> Result<DisputeOpenOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<DisputeOpenOutcome, anyhow::Error, _>(|conn| {
            let unresolved = select(exists(
                disputes::table
                    .filter(disputes::order_id.eq(dispute.order_id))
                    .filter(disputes::resolution.eq(DisputeResolution::Pending.as_str())),
            ))
            .get_result::<bool>(conn)?;

            if unresolved {
                return Ok(DisputeOpenOutcome::AlreadyOpen);
            }

            let id = insert_into(disputes::table)
                .values(&dispute)
                .returning(disputes::id)
                .get_result::<Uuid>(conn)?;

            Ok(DisputeOpenOutcome::Created(id))
        })
    }

    async fn find_by_id(&self, dispute_id: Uuid) -> Result<Option<DisputeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = disputes::table
            .filter(disputes::id.eq(dispute_id))
            .select(DisputeEntity::as_select())
            .first::<DisputeEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_order(&self, order_id: Uuid) -> Result<Option<DisputeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = disputes::table
            .filter(disputes::order_id.eq(order_id))
            .select(DisputeEntity::as_select())
            .order(disputes::opened_at.desc())
            .first::<DisputeEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn has_unresolved_for_order(&self, order_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let unresolved = select(exists(
            disputes::table
                .filter(disputes::order_id.eq(order_id))
                .filter(disputes::resolution.eq(DisputeResolution::Pending.as_str())),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(unresolved)
    }

    async fn resolve(
        &self,
        dispute_id: Uuid,
        resolution: String,
        refund_percent: i32,
        admin_notes: Option<String>,
        resolved_at: DateTime<Utc>,
    ) -> Result<ResolveWriteOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(
            disputes::table
                .filter(disputes::id.eq(dispute_id))
                .filter(disputes::resolution.eq(DisputeResolution::Pending.as_str())),
        )
        .set((
            disputes::resolution.eq(resolution),
            disputes::refund_percent.eq(refund_percent),
            disputes::admin_notes.eq(admin_notes),
            disputes::status.eq(DisputeStatus::Resolved.as_str()),
            disputes::resolved_at.eq(resolved_at),
        ))
        .execute(&mut conn)?;

        if affected == 1 {
            return Ok(ResolveWriteOutcome::Applied);
        }

        let exists_row = disputes::table
            .filter(disputes::id.eq(dispute_id))
            .select(disputes::id)
            .first::<Uuid>(&mut conn)
            .optional()?;
        if exists_row.is_none() {
            bail!("no dispute {}", dispute_id);
        }

        Ok(ResolveWriteOutcome::AlreadyResolved)
    }

    async fn list_open_before(
        &self,
        opened_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DisputeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let stale = disputes::table
            .filter(disputes::status.eq(DisputeStatus::Open.as_str()))
            .filter(disputes::opened_at.lt(opened_before))
            .select(DisputeEntity::as_select())
            .order(disputes::opened_at.asc())
            .limit(limit)
            .load::<DisputeEntity>(&mut conn)?;

        Ok(stale)
    }

    async fn mark_mediation(&self, dispute_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            disputes::table
                .filter(disputes::id.eq(dispute_id))
                .filter(disputes::status.eq(DisputeStatus::Open.as_str())),
        )
        .set(disputes::status.eq(DisputeStatus::Mediation.as_str()))
        .execute(&mut conn)?;

        Ok(())
    }
}
