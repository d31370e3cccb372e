use uuid::Uuid;

/// Three-way outcome of a call against the payment provider. `Unknown` means
/// the money state could not be determined (timeout, connection loss, 5xx);
/// callers must not treat it as a failure and must leave reconciliation to a
/// webhook or a later retry under the same idempotency key.
#[derive(Debug)]
pub enum ProviderCallOutcome<T> {
    Succeeded(T),
    DefinitivelyFailed(ProviderDecline),
    Unknown(String),
}

#[derive(Debug, Clone)]
pub struct ProviderDecline {
    pub code: DeclineCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineCode {
    PaymentDeclined,
    RefundExceedsCaptured,
    SellerAccountNotOnboarded,
    ProviderUnavailable,
    InvalidRequest,
}

impl DeclineCode {
    pub fn from_provider_code(value: &str) -> Self {
        match value {
            "payment_declined" | "card_declined" | "insufficient_funds" => {
                DeclineCode::PaymentDeclined
            }
            "refund_exceeds_captured" => DeclineCode::RefundExceedsCaptured,
            "account_not_onboarded" | "payout_destination_missing" => {
                DeclineCode::SellerAccountNotOnboarded
            }
            "provider_unavailable" => DeclineCode::ProviderUnavailable,
            _ => DeclineCode::InvalidRequest,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub order_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method_token: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct AuthorizationReceipt {
    pub provider_ref: String,
}

/// Capture happens at most once per hold, for the retained amount.
#[derive(Debug, Clone)]
pub struct CaptureReceipt {
    pub captured_minor: i64,
}

/// The provider reports the cumulative refunded amount for the hold, so
/// folding a receipt (or a replayed refund webhook) into local state is a
/// plain set-to-max, never an addition.
#[derive(Debug, Clone)]
pub struct RefundReceipt {
    pub refunded_total_minor: i64,
}

#[derive(Debug, Clone)]
pub struct VoidReceipt {
    pub provider_ref: String,
}

#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub transfer_ref: String,
}

/// Deterministic idempotency key for provider calls. The attempt generation
/// is bumped only after a definitive failure, so retries of ambiguous
/// outcomes reuse the key and dedupe on the provider side.
pub fn idempotency_key(order_id: Uuid, operation: &str, attempt_generation: i32) -> String {
    format!("{}:{}:{}", order_id, operation, attempt_generation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_per_generation() {
        let order_id = Uuid::nil();
        assert_eq!(
            idempotency_key(order_id, "capture", 0),
            idempotency_key(order_id, "capture", 0),
        );
        assert_ne!(
            idempotency_key(order_id, "capture", 0),
            idempotency_key(order_id, "capture", 1),
        );
        assert_ne!(
            idempotency_key(order_id, "capture", 0),
            idempotency_key(order_id, "refund", 0),
        );
    }

    #[test]
    fn unknown_provider_codes_map_to_invalid_request() {
        assert_eq!(
            DeclineCode::from_provider_code("card_declined"),
            DeclineCode::PaymentDeclined
        );
        assert_eq!(
            DeclineCode::from_provider_code("some_new_code"),
            DeclineCode::InvalidRequest
        );
    }
}
