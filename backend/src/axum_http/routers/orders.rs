use std::sync::Arc;

use application::usecases::order_lifecycle::{CompletionTrigger, OrderLifecycleUseCase};
use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use domain::value_objects::enums::actor_roles::ActorRole;
use serde::Deserialize;
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

#[derive(Debug, Deserialize)]
pub struct SellerAction {
    pub seller_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BuyerAction {
    pub buyer_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CancelAction {
    pub actor_role: String,
    pub actor_id: Uuid,
    pub reason: Option<String>,
}

pub fn routes(usecase: Arc<OrderLifecycleUseCase>) -> Router {
    Router::new()
        .route("/:order_id", get(get_order))
        .route("/:order_id/start", post(start_work))
        .route("/:order_id/deliver", post(deliver))
        .route("/:order_id/revision", post(request_revision))
        .route("/:order_id/resume", post(resume_work))
        .route("/:order_id/complete", post(complete_order))
        .route("/:order_id/cancel", post(cancel))
        .with_state(usecase)
}

pub async fn get_order(
    State(usecase): State<Arc<OrderLifecycleUseCase>>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let details = usecase.get_order_details(order_id).await?;
    Ok(Json(details))
}

pub async fn start_work(
    State(usecase): State<Arc<OrderLifecycleUseCase>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<SellerAction>,
) -> Result<impl IntoResponse, AppError> {
    usecase.start_work(order_id, payload.seller_id).await?;
    let details = usecase.get_order_details(order_id).await?;
    Ok(Json(details))
}

pub async fn deliver(
    State(usecase): State<Arc<OrderLifecycleUseCase>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<SellerAction>,
) -> Result<impl IntoResponse, AppError> {
    usecase.deliver(order_id, payload.seller_id).await?;
    let details = usecase.get_order_details(order_id).await?;
    Ok(Json(details))
}

pub async fn request_revision(
    State(usecase): State<Arc<OrderLifecycleUseCase>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<BuyerAction>,
) -> Result<impl IntoResponse, AppError> {
    usecase.request_revision(order_id, payload.buyer_id).await?;
    let details = usecase.get_order_details(order_id).await?;
    Ok(Json(details))
}

pub async fn resume_work(
    State(usecase): State<Arc<OrderLifecycleUseCase>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<SellerAction>,
) -> Result<impl IntoResponse, AppError> {
    usecase.resume_work(order_id, payload.seller_id).await?;
    let details = usecase.get_order_details(order_id).await?;
    Ok(Json(details))
}

pub async fn complete_order(
    State(usecase): State<Arc<OrderLifecycleUseCase>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<BuyerAction>,
) -> Result<impl IntoResponse, AppError> {
    usecase
        .complete(
            order_id,
            CompletionTrigger::BuyerAccept {
                buyer_id: payload.buyer_id,
            },
        )
        .await?;
    let details = usecase.get_order_details(order_id).await?;
    Ok(Json(details))
}

pub async fn cancel(
    State(usecase): State<Arc<OrderLifecycleUseCase>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<CancelAction>,
) -> Result<impl IntoResponse, AppError> {
    let Some(role) = ActorRole::from_str(&payload.actor_role) else {
        return Err(AppError::BadRequest(format!(
            "unknown actor role {:?}",
            payload.actor_role
        )));
    };

    usecase
        .cancel(order_id, role, payload.actor_id, payload.reason)
        .await?;
    let details = usecase.get_order_details(order_id).await?;
    Ok(Json(details))
}
