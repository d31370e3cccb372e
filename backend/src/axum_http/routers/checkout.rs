use std::sync::Arc;

use application::usecases::checkout::CheckoutUseCase;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use domain::value_objects::checkout::PlaceOrderRequest;

use crate::axum_http::error_responses::AppError;

pub fn routes(usecase: Arc<CheckoutUseCase>) -> Router {
    Router::new()
        .route("/", post(place_order))
        .with_state(usecase)
}

pub async fn place_order(
    State(usecase): State<Arc<CheckoutUseCase>>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = usecase.place_order(payload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
