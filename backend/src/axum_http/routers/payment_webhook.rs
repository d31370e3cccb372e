use std::sync::Arc;

use application::usecases::webhook_reconciler::{WebhookAck, WebhookReconcilerUseCase};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};

use crate::axum_http::error_responses::AppError;

const SIGNATURE_HEADER: &str = "X-Provider-Signature";

pub fn routes(usecase: Arc<WebhookReconcilerUseCase>) -> Router {
    Router::new().route("/", post(receive)).with_state(usecase)
}

/// Raw-body handler. Signature verification needs the exact bytes the
/// provider signed, so deserialization happens inside the use case after
/// the HMAC check.
pub async fn receive(
    State(usecase): State<Arc<WebhookReconcilerUseCase>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let ack = usecase.handle_delivery(&body, signature).await?;

    let status = match ack {
        WebhookAck::Processed => "processed",
        WebhookAck::Duplicate => "duplicate",
        WebhookAck::Ignored => "ignored",
    };

    Ok((StatusCode::OK, Json(serde_json::json!({ "status": status }))))
}
