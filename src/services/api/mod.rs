//! HTTP API
//!
//! Thin axum handlers over [`SentinelCore`]. Capture and flow-metric routes
//! are open to any caller (the ingress guard limits them); admin routes need
//! an actor with the admin role.

mod extract;
mod handlers;
mod response;

pub use extract::{
    client_ip, RequestActor, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, FORWARDED_FOR_HEADER,
    REQUEST_ID_HEADER,
};
pub use handlers::{ApiState, IncidentActionRequest};

use crate::sentinel::SentinelCore;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub fn router(core: Arc<SentinelCore>) -> Router {
    let request_timeout = core.config.server.request_timeout;

    Router::new()
        .route("/healthz", get(handlers::liveness))
        .route("/api/monitoring/errors", post(handlers::capture_error))
        .route(
            "/api/monitoring/client-errors",
            post(handlers::capture_client_error),
        )
        .route(
            "/api/monitoring/flow-metrics",
            post(handlers::record_flow_metric),
        )
        .route("/api/admin/health", get(handlers::admin_health))
        .route("/api/admin/incidents", post(handlers::admin_incident_action))
        .route("/api/admin/slo/evaluate", post(handlers::admin_evaluate_slo))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(extract::assign_request_id))
                .layer(TraceLayer::new_for_http().make_span_with(extract::request_span))
                .layer(TimeoutLayer::new(request_timeout))
                .into_inner(),
        )
        .with_state(core)
}
