use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::webhook_events;

/// Dedupe ledger for provider webhooks. A row is inserted when an event is
/// first received and `processed_at` is stamped only after its effects have
/// landed, so a crash in between leaves the event eligible for resume.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = webhook_events)]
pub struct WebhookEventEntity {
    pub id: Uuid,
    pub provider_event_id: String,
    pub event_type: String,
    pub payload_hash: String,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhook_events)]
pub struct InsertWebhookEventEntity {
    pub provider_event_id: String,
    pub event_type: String,
    pub payload_hash: String,
}
