use uuid::Uuid;

/// A verified, parsed webhook event from the payment provider. The raw wire
/// shape lives in the infra client; by the time an event reaches a use case
/// it is either one of the known kinds or `Unrecognized` (recorded and
/// acknowledged without further effects).
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub provider_event_id: String,
    pub event_type: String,
    pub payload_hash: String,
    pub kind: ProviderEventKind,
}

#[derive(Debug, Clone)]
pub enum ProviderEventKind {
    PaymentAuthorized {
        order_id: Uuid,
        provider_ref: String,
        amount_minor: i64,
    },
    PaymentFailed {
        order_id: Uuid,
        provider_ref: String,
        reason: String,
    },
    PaymentCaptured {
        order_id: Uuid,
        provider_ref: String,
        captured_minor: i64,
    },
    PaymentRefunded {
        order_id: Uuid,
        provider_ref: String,
        refunded_total_minor: i64,
    },
    PayoutCompleted {
        order_id: Uuid,
        transfer_ref: String,
    },
    PayoutFailed {
        order_id: Uuid,
        transfer_ref: String,
        reason: String,
    },
    Unrecognized {
        event_type: String,
    },
}
