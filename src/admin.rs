//! Health, readiness, liveness, and metrics endpoints.

use crate::health::{HealthAggregator, Overall};
use crate::metrics::Metrics;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
struct AdminState {
    health: Arc<HealthAggregator>,
    metrics: Arc<Metrics>,
}

pub fn router(health: Arc<HealthAggregator>, metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/health", get(health_endpoint))
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/metrics", get(metrics_endpoint))
        .with_state(Arc::new(AdminState { health, metrics }))
}

/// Bind and serve until the task is aborted.
pub async fn serve(
    port: u16,
    health: Arc<HealthAggregator>,
    metrics: Arc<Metrics>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "health surface listening");
    axum::serve(listener, router(health, metrics)).await
}

async fn health_endpoint(State(state): State<Arc<AdminState>>) -> Response {
    let status = state.health.status();
    let code = match status.overall {
        Overall::Healthy | Overall::Degraded => StatusCode::OK,
        Overall::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(status)).into_response()
}

async fn ready(State(state): State<Arc<AdminState>>) -> Response {
    if state.health.ready() {
        (StatusCode::OK, Json(json!({"ready": true}))).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"ready": false}))).into_response()
    }
}

async fn live(State(state): State<Arc<AdminState>>) -> Response {
    if state.health.live() {
        (StatusCode::OK, Json(json!({"live": true}))).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"live": false}))).into_response()
    }
}

async fn metrics_endpoint(State(state): State<Arc<AdminState>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}
