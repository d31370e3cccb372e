use application::error::OrderFlowError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

/// App-level error type for the HTTP surface. Flow errors carry their own
/// message through; internal errors are logged and replaced with a generic
/// body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(err) => {
                // Don't leak internal error detail to the client
                error!(error = ?err, "request failed with an internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrderFlowError> for AppError {
    fn from(err: OrderFlowError) -> Self {
        match err {
            OrderFlowError::Validation(_) | OrderFlowError::InvalidSignature => {
                AppError::BadRequest(err.to_string())
            }
            OrderFlowError::PaymentDeclined(_) => AppError::PaymentRequired(err.to_string()),
            OrderFlowError::NotAllowed(_) => AppError::Forbidden(err.to_string()),
            OrderFlowError::NotFound(_) => AppError::NotFound(err.to_string()),
            OrderFlowError::InvalidTransition { .. }
            | OrderFlowError::DisputeAlreadyExists
            | OrderFlowError::DisputeAlreadyResolved
            | OrderFlowError::DisputePending
            | OrderFlowError::ConcurrentModification
            | OrderFlowError::RefundExceedsCaptured
            | OrderFlowError::SellerAccountNotOnboarded
            | OrderFlowError::ReconciliationPending => AppError::Conflict(err.to_string()),
            OrderFlowError::RevisionLimitExceeded { .. }
            | OrderFlowError::DisputeWindowExpired
            | OrderFlowError::OrderNotDisputable { .. } => AppError::Unprocessable(err.to_string()),
            OrderFlowError::ProviderUnavailable(_) => AppError::BadGateway(err.to_string()),
            OrderFlowError::Internal(err) => AppError::Internal(err),
        }
    }
}
