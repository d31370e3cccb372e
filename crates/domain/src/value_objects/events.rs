use uuid::Uuid;

use crate::value_objects::enums::dispute_resolutions::DisputeResolution;
use crate::value_objects::enums::order_statuses::OrderStatus;

/// Facts other parts of the platform care about (notifications, analytics).
/// Publishing is best-effort; the order books stay consistent even if an
/// event is lost.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    OrderAccepted {
        order_id: Uuid,
        buyer_id: Uuid,
        seller_id: Uuid,
    },
    OrderDelivered {
        order_id: Uuid,
        buyer_id: Uuid,
        seller_id: Uuid,
    },
    OrderCompleted {
        order_id: Uuid,
        buyer_id: Uuid,
        seller_id: Uuid,
        seller_earnings_minor: i64,
    },
    OrderCancelled {
        order_id: Uuid,
        buyer_id: Uuid,
        seller_id: Uuid,
        refunded_minor: i64,
    },
    RevisionRequested {
        order_id: Uuid,
        buyer_id: Uuid,
        seller_id: Uuid,
        revision_count: i32,
    },
    DisputeOpened {
        dispute_id: Uuid,
        order_id: Uuid,
        opened_by: Uuid,
    },
    DisputeResolved {
        dispute_id: Uuid,
        order_id: Uuid,
        resolution: DisputeResolution,
        refund_minor: i64,
        order_status: OrderStatus,
    },
}
