use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::entities::webhook_events::InsertWebhookEventEntity;

/// How a received provider event relates to what we have already seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceivedEventDisposition {
    /// First sighting; the row was inserted.
    New,
    /// Seen before but never marked processed; safe to re-run the effects.
    Resumed,
    /// Fully processed earlier; acknowledge without effects.
    AlreadyProcessed,
}

#[async_trait]
#[automock]
pub trait WebhookEventRepository {
    /// Insert-or-skip keyed on the provider event id.
    async fn record_received(
        &self,
        event: InsertWebhookEventEntity,
    ) -> Result<ReceivedEventDisposition>;

    async fn mark_processed(&self, provider_event_id: String) -> Result<()>;
}
