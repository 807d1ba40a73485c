//! Minimal JSON-RPC 2.0 handling for the tool protocol.
//!
//! Both transports decode frames into [`RpcRequest`] and feed them here.
//! Requests without an id are notifications and produce no response.

use super::ToolSurface;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError { code, message: message.into() }),
        }
    }
}

/// Decode a raw frame and dispatch it. `None` means nothing should be
/// written back (notification).
pub async fn handle_frame(surface: &ToolSurface, raw: &[u8]) -> Option<RpcResponse> {
    let request: RpcRequest = match serde_json::from_slice(raw) {
        Ok(request) => request,
        Err(error) => {
            return Some(RpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: {error}"),
            ))
        }
    };
    handle_request(surface, request).await
}

pub async fn handle_request(surface: &ToolSurface, request: RpcRequest) -> Option<RpcResponse> {
    let id = request.id.clone();
    let is_notification = id.is_none();
    let id = id.unwrap_or(Value::Null);

    if !request.jsonrpc.is_empty() && request.jsonrpc != "2.0" {
        return Some(RpcResponse::error(id, INVALID_REQUEST, "unsupported jsonrpc version"));
    }

    let response = match request.method.as_str() {
        "initialize" => RpcResponse::result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "ping" => RpcResponse::result(id, json!({})),
        "notifications/initialized" | "notifications/cancelled" => return None,
        "tools/list" => {
            RpcResponse::result(id, json!({ "tools": surface.list_tools() }))
        }
        "tools/call" => {
            let name = request.params.get("name").and_then(|v| v.as_str());
            let Some(name) = name else {
                return Some(RpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "tools/call requires params.name",
                ));
            };
            let arguments =
                request.params.get("arguments").cloned().unwrap_or(Value::Null);
            let reply = surface.call_tool(name, arguments).await;
            let is_error = !reply.ok;
            let text = serde_json::to_string(&reply)
                .unwrap_or_else(|_| r#"{"ok":false,"description":"Internal error"}"#.to_string());
            RpcResponse::result(
                id,
                json!({
                    "content": [{"type": "text", "text": text}],
                    "isError": is_error,
                }),
            )
        }
        other => RpcResponse::error(id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
    };

    if is_notification {
        None
    } else {
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ToolMode;
    use crate::http::ScriptedTransport;
    use crate::pipeline::Pipeline;
    use crate::sleeper::InstantSleeper;
    use std::sync::Arc;

    fn surface() -> (ToolSurface, ScriptedTransport) {
        let transport = ScriptedTransport::always_ok();
        let pipeline = Pipeline::builder(Arc::new(transport.clone()))
            .clock(ManualClock::new())
            .sleeper(InstantSleeper)
            .build()
            .expect("pipeline builds");
        (ToolSurface::new(Arc::new(pipeline), ToolMode::Meta), transport)
    }

    #[tokio::test]
    async fn initialize_advertises_tools_capability() {
        let (surface, _) = surface();
        let raw = br#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let response = handle_frame(&surface, raw).await.unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "botgate");
    }

    #[tokio::test]
    async fn tools_call_wraps_the_envelope_as_text() {
        let (surface, _) = surface();
        let raw = br#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"call","arguments":{"tool":"get_identity","params":{}}}}"#;
        let response = handle_frame(&surface, raw).await.unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();
        assert_eq!(envelope["ok"], true);
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let (surface, _) = surface();
        let raw = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(handle_frame(&surface, raw).await.is_none());
    }

    #[tokio::test]
    async fn malformed_json_yields_parse_error_with_null_id() {
        let (surface, _) = surface();
        let response = handle_frame(&surface, b"{nope").await.unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, PARSE_ERROR);
        assert_eq!(response.id, Value::Null);
    }

    #[tokio::test]
    async fn unknown_rpc_method_is_method_not_found() {
        let (surface, _) = surface();
        let raw = br#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#;
        let response = handle_frame(&surface, raw).await.unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_call_without_name_is_invalid_params() {
        let (surface, _) = surface();
        let raw = br#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{}}"#;
        let response = handle_frame(&surface, raw).await.unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }
}
