//! Inbound webhook receiver.
//!
//! Accepts platform update objects on `POST /` and `POST /webhook`,
//! optionally gated by a shared-secret header, and parks them in a
//! bounded in-memory queue. The queue drops oldest on overflow: a slow
//! consumer loses history, never availability.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Maximum parked updates before the oldest is dropped.
pub const QUEUE_CAP: usize = 1000;

/// Shared-secret header checked when a secret is configured.
pub const SECRET_HEADER: &str = "x-bot-api-secret-token";

/// Bounded in-memory update queue shared with the consumer side.
#[derive(Debug, Clone, Default)]
pub struct UpdateQueue {
    inner: Arc<Mutex<VecDeque<Value>>>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an update. Returns true when an older update was dropped to
    /// make room.
    pub fn push(&self, update: Value) -> bool {
        let mut queue = self.lock();
        let dropped = queue.len() >= QUEUE_CAP;
        if dropped {
            queue.pop_front();
        }
        queue.push_back(update);
        dropped
    }

    pub fn pop(&self) -> Option<Value> {
        self.lock().pop_front()
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Value>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
struct WebhookState {
    queue: UpdateQueue,
    secret: Option<String>,
}

pub fn router(queue: UpdateQueue, secret: Option<String>) -> Router {
    let state = Arc::new(WebhookState { queue, secret });
    Router::new()
        .route("/", post(accept))
        .route("/webhook", post(accept))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until the task is aborted.
pub async fn serve(
    port: u16,
    queue: UpdateQueue,
    secret: Option<String>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "webhook receiver listening");
    axum::serve(listener, router(queue, secret)).await
}

async fn accept(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    Json(update): Json<Value>,
) -> Response {
    if let Some(expected) = &state.secret {
        let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            tracing::warn!("webhook rejected: secret token mismatch");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    if state.queue.push(update) {
        tracing::warn!(cap = QUEUE_CAP, "webhook queue full, dropped oldest update");
    }
    Json(json!({"ok": true})).into_response()
}

async fn health(State(state): State<Arc<WebhookState>>) -> Json<Value> {
    Json(json!({"ok": true, "pending": state.queue.pending()}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn post_update(path: &str, body: &str, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[test]
    fn queue_drops_oldest_on_overflow() {
        let queue = UpdateQueue::new();
        for i in 0..QUEUE_CAP {
            assert!(!queue.push(json!({"update_id": i})));
        }
        assert!(queue.push(json!({"update_id": QUEUE_CAP})));
        assert_eq!(queue.pending(), QUEUE_CAP);
        assert_eq!(queue.pop().unwrap()["update_id"], 1, "oldest was dropped");
    }

    #[tokio::test]
    async fn accepts_updates_on_both_paths() {
        let queue = UpdateQueue::new();
        for path in ["/", "/webhook"] {
            let app = router(queue.clone(), None);
            let response =
                app.oneshot(post_update(path, r#"{"update_id": 1}"#, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(queue.pending(), 2);
    }

    #[tokio::test]
    async fn secret_mismatch_is_unauthorized() {
        let queue = UpdateQueue::new();
        let app = router(queue.clone(), Some("s3cret".to_string()));
        let response = app
            .oneshot(post_update("/webhook", r#"{"update_id": 1}"#, Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(queue.pending(), 0);

        let app = router(queue.clone(), Some("s3cret".to_string()));
        let response = app
            .oneshot(post_update("/webhook", r#"{"update_id": 1}"#, Some("s3cret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test]
    async fn non_post_on_webhook_path_is_method_not_allowed() {
        let app = router(UpdateQueue::new(), None);
        let response = app
            .oneshot(Request::builder().method("GET").uri("/webhook").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let app = router(UpdateQueue::new(), None);
        let response = app
            .oneshot(Request::builder().method("POST").uri("/elsewhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_pending_count() {
        let queue = UpdateQueue::new();
        queue.push(json!({"update_id": 9}));
        let app = router(queue, None);
        let response = app
            .oneshot(Request::builder().method("GET").uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, json!({"ok": true, "pending": 1}));
    }
}
