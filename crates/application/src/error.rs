use domain::value_objects::enums::order_statuses::OrderStatus;
use domain::value_objects::gateway::{DeclineCode, ProviderDecline};
use thiserror::Error;

pub type FlowResult<T> = Result<T, OrderFlowError>;

/// Everything an order flow can refuse to do, separated from plain
/// infrastructure failures so the HTTP layer can map each case to a status
/// code without string matching.
#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("acting party is not the order's {0}")]
    NotAllowed(&'static str),

    #[error("revision limit of {max} reached")]
    RevisionLimitExceeded { max: i32 },

    #[error("the dispute window for this order has closed")]
    DisputeWindowExpired,

    #[error("order in status {status} cannot be disputed")]
    OrderNotDisputable { status: String },

    #[error("order already has an unresolved dispute")]
    DisputeAlreadyExists,

    #[error("dispute is already resolved")]
    DisputeAlreadyResolved,

    #[error("order has an unresolved dispute; lifecycle is frozen")]
    DisputePending,

    #[error("order changed concurrently, retry")]
    ConcurrentModification,

    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    #[error("refund amount exceeds the captured amount")]
    RefundExceedsCaptured,

    #[error("seller has no active payout account")]
    SellerAccountNotOnboarded,

    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("money movement is awaiting provider confirmation")]
    ReconciliationPending,

    #[error("webhook signature verification failed")]
    InvalidSignature,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ProviderDecline> for OrderFlowError {
    fn from(decline: ProviderDecline) -> Self {
        match decline.code {
            DeclineCode::PaymentDeclined => OrderFlowError::PaymentDeclined(decline.message),
            DeclineCode::RefundExceedsCaptured => OrderFlowError::RefundExceedsCaptured,
            DeclineCode::SellerAccountNotOnboarded => OrderFlowError::SellerAccountNotOnboarded,
            DeclineCode::ProviderUnavailable => OrderFlowError::ProviderUnavailable(decline.message),
            DeclineCode::InvalidRequest => OrderFlowError::Internal(anyhow::anyhow!(
                "provider rejected the request: {}",
                decline.message
            )),
        }
    }
}
