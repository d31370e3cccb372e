use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use domain::repositories::events::DomainEventPublisher;
use domain::value_objects::events::DomainEvent;

/// Emits lifecycle events as structured log lines. Stands in for a message
/// bus; notification and analytics consumers tail the log stream until one
/// exists.
#[derive(Default)]
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DomainEventPublisher for TracingEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        match event {
            DomainEvent::OrderAccepted {
                order_id,
                buyer_id,
                seller_id,
            } => {
                info!(%order_id, %buyer_id, %seller_id, event = "order.accepted", "domain_event");
            }
            DomainEvent::OrderDelivered {
                order_id,
                buyer_id,
                seller_id,
            } => {
                info!(%order_id, %buyer_id, %seller_id, event = "order.delivered", "domain_event");
            }
            DomainEvent::OrderCompleted {
                order_id,
                buyer_id,
                seller_id,
                seller_earnings_minor,
            } => {
                info!(
                    %order_id,
                    %buyer_id,
                    %seller_id,
                    seller_earnings_minor,
                    event = "order.completed",
                    "domain_event"
                );
            }
            DomainEvent::OrderCancelled {
                order_id,
                buyer_id,
                seller_id,
                refunded_minor,
            } => {
                info!(
                    %order_id,
                    %buyer_id,
                    %seller_id,
                    refunded_minor,
                    event = "order.cancelled",
                    "domain_event"
                );
            }
            DomainEvent::RevisionRequested {
                order_id,
                buyer_id,
                seller_id,
                revision_count,
            } => {
                info!(
                    %order_id,
                    %buyer_id,
                    %seller_id,
                    revision_count,
                    event = "order.revision_requested",
                    "domain_event"
                );
            }
            DomainEvent::DisputeOpened {
                dispute_id,
                order_id,
                opened_by,
            } => {
                info!(
                    %dispute_id,
                    %order_id,
                    %opened_by,
                    event = "dispute.opened",
                    "domain_event"
                );
            }
            DomainEvent::DisputeResolved {
                dispute_id,
                order_id,
                resolution,
                refund_minor,
                order_status,
            } => {
                info!(
                    %dispute_id,
                    %order_id,
                    %resolution,
                    refund_minor,
                    %order_status,
                    event = "dispute.resolved",
                    "domain_event"
                );
            }
        }

        Ok(())
    }
}
