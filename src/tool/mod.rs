//! The client-facing tool surface.
//!
//! Two shapes over the same pipeline: flat (one tool per platform method)
//! and meta (`find` + `call`). Either way a tool call produces the reply
//! envelope, serialised as a single text payload. Transports — newline
//! framed stdio and HTTP POST — live in submodules and share this router.

pub mod http;
pub mod rpc;
pub mod stdio;

use crate::config::ToolMode;
use crate::envelope::ApiReply;
use crate::methods::{registry, MethodCategory, MethodDescriptor, ParamKind};
use crate::pipeline::{InvokeOptions, Pipeline};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// One entry in `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Routes tool calls into the pipeline.
#[derive(Clone)]
pub struct ToolSurface {
    pipeline: Arc<Pipeline>,
    mode: ToolMode,
}

impl ToolSurface {
    pub fn new(pipeline: Arc<Pipeline>, mode: ToolMode) -> Self {
        Self { pipeline, mode }
    }

    pub fn list_tools(&self) -> Vec<ToolDef> {
        match self.mode {
            ToolMode::Flat => registry()
                .all()
                .map(|descriptor| ToolDef {
                    name: descriptor.name.to_string(),
                    description: descriptor.description.to_string(),
                    input_schema: schema_for(descriptor),
                })
                .collect(),
            ToolMode::Meta => vec![
                ToolDef {
                    name: "find".to_string(),
                    description: "Search the available platform operations by name or purpose"
                        .to_string(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {
                            "query": {"type": "string"},
                            "category": {"type": "string"},
                            "limit": {"type": "integer", "minimum": 1, "maximum": 50},
                        },
                        "required": ["query"],
                    }),
                },
                ToolDef {
                    name: "call".to_string(),
                    description: "Invoke a platform operation by name with a JSON parameter object"
                        .to_string(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {
                            "tool": {"type": "string"},
                            "params": {"type": "object"},
                        },
                        "required": ["tool"],
                    }),
                },
            ],
        }
    }

    /// Dispatch one tool call, always producing an envelope.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ApiReply {
        match self.mode {
            ToolMode::Flat => self.invoke_guarded(name.to_string(), arguments).await,
            ToolMode::Meta => match name {
                "find" => find(&arguments),
                "call" => {
                    let tool = arguments
                        .get("tool")
                        .and_then(|v| v.as_str())
                        .map(str::to_string);
                    match tool {
                        Some(tool) => {
                            let params =
                                arguments.get("params").cloned().unwrap_or(Value::Null);
                            self.invoke_guarded(tool, params).await
                        }
                        None => ApiReply::failure(400, "call requires a \"tool\" field"),
                    }
                }
                other => ApiReply::failure(400, format!("unknown tool: {other}")),
            },
        }
    }

    /// Run the invocation on its own task so an internal panic becomes a
    /// generic envelope instead of tearing down the transport.
    async fn invoke_guarded(&self, method: String, params: Value) -> ApiReply {
        let pipeline = self.pipeline.clone();
        let handle = tokio::spawn(async move {
            pipeline.invoke(&method, params, InvokeOptions::default()).await
        });
        match handle.await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::error!(%error, "invocation task failed");
                ApiReply::internal_error()
            }
        }
    }
}

/// The `find` meta tool: ranked descriptor search.
fn find(arguments: &Value) -> ApiReply {
    let Some(query) = arguments.get("query").and_then(|v| v.as_str()) else {
        return ApiReply::failure(400, "find requires a \"query\" field");
    };
    let category = arguments
        .get("category")
        .and_then(|v| v.as_str())
        .and_then(MethodCategory::parse);
    let limit = arguments
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|n| n.clamp(1, 50) as usize)
        .unwrap_or(10);

    let results: Vec<Value> = registry()
        .search(query, category, limit)
        .into_iter()
        .map(|descriptor| {
            json!({
                "name": descriptor.name,
                "description": descriptor.description,
                "category": descriptor.category.as_str(),
                "required": descriptor.required().collect::<Vec<_>>(),
                "optional": descriptor.optional().collect::<Vec<_>>(),
            })
        })
        .collect();
    ApiReply::success(json!({ "results": results }))
}

/// JSON-Schema fragment for one method's parameter object.
fn schema_for(descriptor: &MethodDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for spec in descriptor.params {
        properties.insert(spec.name.to_string(), kind_schema(&spec.kind));
        if spec.required {
            required.push(Value::String(spec.name.to_string()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn kind_schema(kind: &ParamKind) -> Value {
    match kind {
        ParamKind::String => json!({"type": "string"}),
        ParamKind::StringOrInteger => json!({"type": ["string", "integer"]}),
        ParamKind::Integer { min, max } => {
            let mut schema = Map::new();
            schema.insert("type".to_string(), json!("integer"));
            if let Some(min) = min {
                schema.insert("minimum".to_string(), json!(min));
            }
            if let Some(max) = max {
                schema.insert("maximum".to_string(), json!(max));
            }
            Value::Object(schema)
        }
        ParamKind::Number { min, max } => {
            let mut schema = Map::new();
            schema.insert("type".to_string(), json!("number"));
            if let Some(min) = min {
                schema.insert("minimum".to_string(), json!(min));
            }
            if let Some(max) = max {
                schema.insert("maximum".to_string(), json!(max));
            }
            Value::Object(schema)
        }
        ParamKind::Boolean => json!({"type": "boolean"}),
        ParamKind::Enumeration(allowed) => json!({"type": "string", "enum": allowed}),
        ParamKind::Array { items } => match items {
            Some(item) => json!({"type": "array", "items": kind_schema(item)}),
            None => json!({"type": "array"}),
        },
        ParamKind::Object => json!({"type": "object"}),
    }
}
