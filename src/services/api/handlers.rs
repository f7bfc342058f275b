use super::extract::{capture_meta, RequestActor};
use crate::error::{Error, Result};
use crate::monitoring::{
    ActionResult, BurnRateReport, CaptureOutcome, CapturePayload, DropReason, FlowMetricInput,
    HealthReport, IncidentAction,
};
use crate::sentinel::SentinelCore;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub type ApiState = Arc<SentinelCore>;

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| Error::InvalidInput(rejection.body_text()))
}

fn outcome_response(outcome: CaptureOutcome) -> Response {
    match outcome {
        CaptureOutcome::Recorded { .. } => (StatusCode::ACCEPTED, Json(outcome)).into_response(),
        CaptureOutcome::Dropped {
            reason: DropReason::EmptyMessage,
        } => Error::InvalidInput("message must not be empty".to_string()).into_response(),
        CaptureOutcome::Dropped {
            reason: DropReason::RateLimited,
        } => Error::RateLimitExceeded("too many reports from this client".to_string())
            .into_response(),
    }
}

pub async fn capture_error(
    State(core): State<ApiState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CapturePayload>, JsonRejection>,
) -> Result<Response> {
    let payload = body(payload)?;
    let outcome = core.capture.capture_error(payload, capture_meta(&headers)).await;
    Ok(outcome_response(outcome))
}

pub async fn capture_client_error(
    State(core): State<ApiState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CapturePayload>, JsonRejection>,
) -> Result<Response> {
    let payload = body(payload)?;
    let outcome = core
        .capture
        .capture_client_error(payload, capture_meta(&headers))
        .await;
    Ok(outcome_response(outcome))
}

pub async fn record_flow_metric(
    State(core): State<ApiState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<FlowMetricInput>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let mut input = body(payload)?;
    let meta = capture_meta(&headers);
    if input.user_id.is_none() {
        input.user_id = meta.user_id;
    }
    if input.request_id.is_none() {
        input.request_id = meta.request_id;
    }

    let accepted = core.flow_metrics.record_flow_metric(input).await;
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": accepted }))))
}

pub async fn admin_health(
    State(core): State<ApiState>,
    actor: RequestActor,
) -> Result<Json<HealthReport>> {
    actor.require_admin()?;
    Ok(Json(core.health.health_report().await))
}

#[derive(Debug, Deserialize)]
pub struct IncidentActionRequest {
    pub action: IncidentAction,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

pub async fn admin_incident_action(
    State(core): State<ApiState>,
    RequestActor(actor): RequestActor,
    payload: std::result::Result<Json<IncidentActionRequest>, JsonRejection>,
) -> Result<Json<ActionResult>> {
    let request = body(payload)?;
    let result = core
        .admin
        .perform(request.action, request.fingerprint.as_deref(), &actor)
        .await?;
    Ok(Json(result))
}

pub async fn admin_evaluate_slo(
    State(core): State<ApiState>,
    actor: RequestActor,
) -> Result<Json<BurnRateReport>> {
    actor.require_admin()?;
    Ok(Json(core.burn_rates.evaluate_burn_rates().await))
}

pub async fn liveness() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
