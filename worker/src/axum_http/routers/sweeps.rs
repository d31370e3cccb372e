use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::auto_accept_sweep::{AutoAcceptSweepParams, AutoAcceptSweepUseCase},
    usecases::dispute_escalation_sweep::{
        DisputeEscalationSweepParams, DisputeEscalationSweepUseCase,
    },
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/sweeps/auto-accept" \
//     -H "Authorization: Bearer $INTERNAL_SWEEP_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"limit":100,"dry_run":true}'

#[derive(Clone)]
pub struct SweepRouteState {
    config: Arc<DotEnvyConfig>,
    auto_accept: Arc<AutoAcceptSweepUseCase>,
    dispute_escalation: Arc<DisputeEscalationSweepUseCase>,
}

pub fn routes(
    config: Arc<DotEnvyConfig>,
    auto_accept: Arc<AutoAcceptSweepUseCase>,
    dispute_escalation: Arc<DisputeEscalationSweepUseCase>,
) -> Router {
    Router::new()
        .route("/auto-accept", post(run_auto_accept))
        .route("/dispute-escalation", post(run_dispute_escalation))
        .with_state(SweepRouteState {
            config,
            auto_accept,
            dispute_escalation,
        })
}

#[derive(Debug, Deserialize)]
pub struct AutoAcceptSweepRequest {
    pub limit: Option<i64>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AutoAcceptSweepResponse {
    pub scanned: usize,
    pub completed: usize,
    pub dispute_blocked: usize,
    pub awaiting_provider: usize,
    pub conflicted: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub candidate_ids: Vec<Uuid>,
    pub completed_ids: Vec<Uuid>,
    pub failed_ids: Vec<Uuid>,
}

pub async fn run_auto_accept(
    State(state): State<SweepRouteState>,
    headers: HeaderMap,
    Json(payload): Json<AutoAcceptSweepRequest>,
) -> Response {
    let expected_token = match state.config.sweep.internal_token.as_deref() {
        Some(token) => token,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "sweep token is not configured",
            )
                .into_response();
        }
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (status, "unauthorized").into_response();
    }

    let params = AutoAcceptSweepParams {
        limit: payload.limit.unwrap_or(state.config.sweep.batch_size),
        dry_run: payload.dry_run.unwrap_or(false),
    };

    match state.auto_accept.run(params.clone()).await {
        Ok(result) => Json(AutoAcceptSweepResponse {
            scanned: result.scanned,
            completed: result.completed,
            dispute_blocked: result.dispute_blocked,
            awaiting_provider: result.awaiting_provider,
            conflicted: result.conflicted,
            failed: result.failed,
            dry_run: params.dry_run,
            candidate_ids: result.candidate_ids,
            completed_ids: result.completed_ids,
            failed_ids: result.failed_ids,
        })
        .into_response(),
        Err(err) => {
            error!(error = ?err, "sweeps: auto-accept sweep failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DisputeEscalationSweepRequest {
    pub open_longer_than_days: Option<i64>,
    pub limit: Option<i64>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DisputeEscalationSweepResponse {
    pub scanned: usize,
    pub escalated: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub candidate_ids: Vec<Uuid>,
    pub escalated_ids: Vec<Uuid>,
}

pub async fn run_dispute_escalation(
    State(state): State<SweepRouteState>,
    headers: HeaderMap,
    Json(payload): Json<DisputeEscalationSweepRequest>,
) -> Response {
    let expected_token = match state.config.sweep.internal_token.as_deref() {
        Some(token) => token,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "sweep token is not configured",
            )
                .into_response();
        }
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (status, "unauthorized").into_response();
    }

    let params = DisputeEscalationSweepParams {
        open_longer_than_days: payload
            .open_longer_than_days
            .unwrap_or(state.config.policy.dispute_escalate_days),
        limit: payload.limit.unwrap_or(state.config.sweep.batch_size),
        dry_run: payload.dry_run.unwrap_or(false),
    };

    match state.dispute_escalation.run(params.clone()).await {
        Ok(result) => Json(DisputeEscalationSweepResponse {
            scanned: result.scanned,
            escalated: result.escalated,
            failed: result.failed,
            dry_run: params.dry_run,
            candidate_ids: result.candidate_ids,
            escalated_ids: result.escalated_ids,
        })
        .into_response(),
        Err(err) => {
            error!(error = ?err, "sweeps: dispute escalation sweep failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
