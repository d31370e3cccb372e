use std::sync::Arc;

use application::usecases::disputes::DisputeUseCase;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use domain::value_objects::disputes::{OpenDisputeRequest, ResolveDisputeRequest};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

pub fn routes(usecase: Arc<DisputeUseCase>) -> Router {
    Router::new()
        .route("/", post(open_dispute))
        .route("/:dispute_id", get(get_dispute))
        .route("/:dispute_id/resolve", post(resolve_dispute))
        .with_state(usecase)
}

pub async fn open_dispute(
    State(usecase): State<Arc<DisputeUseCase>>,
    Json(payload): Json<OpenDisputeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let dispute = usecase.open(payload).await?;
    Ok((StatusCode::CREATED, Json(dispute)))
}

pub async fn get_dispute(
    State(usecase): State<Arc<DisputeUseCase>>,
    Path(dispute_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let dispute = usecase.get(dispute_id).await?;
    Ok(Json(dispute))
}

pub async fn resolve_dispute(
    State(usecase): State<Arc<DisputeUseCase>>,
    Path(dispute_id): Path<Uuid>,
    Json(payload): Json<ResolveDisputeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let summary = usecase.resolve(dispute_id, payload).await?;
    Ok(Json(summary))
}
