use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;

use crate::postgres::{postgres_connection::PgPoolSquad, schema::webhook_events};
use domain::{
    entities::webhook_events::{InsertWebhookEventEntity, WebhookEventEntity},
    repositories::webhook_events::{ReceivedEventDisposition, WebhookEventRepository},
};

pub struct WebhookEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WebhookEventRepository for WebhookEventPostgres {
    async fn record_received(
        &self,
        event: InsertWebhookEventEntity,
    ) -> Result<ReceivedEventDisposition> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(webhook_events::table)
            .values(&event)
            .on_conflict(webhook_events::provider_event_id)
            .do_nothing()
            .execute(&mut conn)?;

        if inserted == 1 {
            return Ok(ReceivedEventDisposition::New);
        }

        let existing = webhook_events::table
            .filter(webhook_events::provider_event_id.eq(&event.provider_event_id))
            .select(WebhookEventEntity::as_select())
            .first::<WebhookEventEntity>(&mut conn)
            .optional()?;

        match existing {
            Some(row) if row.processed_at.is_some() => Ok(ReceivedEventDisposition::AlreadyProcessed),
            // Received earlier but the effects never finished; run them again.
            Some(_) => Ok(ReceivedEventDisposition::Resumed),
            None => bail!(
                "webhook event {} vanished between insert and read",
                event.provider_event_id
            ),
        }
    }

    async fn mark_processed(&self, provider_event_id: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            webhook_events::table
                .filter(webhook_events::provider_event_id.eq(provider_event_id))
                .filter(webhook_events::processed_at.is_null()),
        )
        .set(webhook_events::processed_at.eq(Utc::now()))
        .execute(&mut conn)?;

        Ok(())
    }
}
