//! HTTP framing for the tool protocol.
//!
//! A single `POST /` endpoint carries JSON-RPC frames; notifications are
//! acknowledged with 202 and no body. When an auth token is configured the
//! request must present it as a bearer credential.

use super::rpc;
use super::ToolSurface;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;

#[derive(Clone)]
struct ToolHttpState {
    surface: ToolSurface,
    auth_token: Option<String>,
}

pub fn router(surface: ToolSurface, auth_token: Option<String>) -> Router {
    Router::new()
        .route("/", post(handle))
        .with_state(Arc::new(ToolHttpState { surface, auth_token }))
}

/// Bind and serve until the task is aborted.
pub async fn serve(
    port: u16,
    surface: ToolSurface,
    auth_token: Option<String>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "tool protocol serving on http");
    axum::serve(listener, router(surface, auth_token)).await
}

async fn handle(
    State(state): State<Arc<ToolHttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(expected) = &state.auth_token {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    match rpc::handle_frame(&state.surface, &body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
