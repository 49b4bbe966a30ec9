//! JSON-RPC command surface for editor-integration clients
//!
//! Generator failures are rendered as apology strings here; retrieval and
//! store failures become JSON-RPC error envelopes. A store that never came up
//! is therefore a -32603 error, not an apology, as the command server has
//! always reported a missing store.

use super::models::{McpRequest, McpResponse};
use super::state::AppContext;
use crate::error::{Result, TwinError};
use crate::metrics::METRICS;
use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

/// Only command exposed to clients
pub const QUERY_COMMAND: &str = "digitaltwin.query";

const NOT_CONFIGURED_REPLY: &str =
    "I'm sorry, I couldn't process your request. The AI service is not configured.";
const GENERATION_FAILED_REPLY: &str = "I'm sorry, I encountered an error while processing your request.";

/// Handle one JSON-RPC request
///
/// POST /mcp
pub async fn handle_mcp(State(ctx): State<AppContext>, body: Bytes) -> Json<McpResponse> {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed command request: {}", e);
            METRICS.record_mcp("malformed");
            return Json(McpResponse::error(None, e.to_string()));
        }
    };

    let id = value.get("id").filter(|id| !id.is_null()).cloned();
    let request: McpRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            warn!("Invalid command request: {}", e);
            METRICS.record_mcp("malformed");
            return Json(McpResponse::error(id, e.to_string()));
        }
    };

    debug!("Command request: method={}, jsonrpc={}", request.method, request.jsonrpc);

    let outcome = match request.method.as_str() {
        "initialize" => {
            METRICS.record_mcp("initialize");
            Ok(initialize())
        }
        "workspace/executeCommand" => {
            METRICS.record_mcp("workspace/executeCommand");
            execute_command(&ctx, request.params.as_ref()).await
        }
        other => {
            METRICS.record_mcp("unsupported");
            Ok(json!({ "error": format!("Unsupported method: {}", other) }))
        }
    };

    match outcome {
        Ok(result) => Json(McpResponse::result(request.id, result)),
        Err(e) => {
            error!("Command failed: {}", e);
            Json(McpResponse::error(request.id, e.to_string()))
        }
    }
}

fn initialize() -> Value {
    json!({
        "capabilities": {
            "completionProvider": {},
            "executeCommandProvider": {
                "commands": [QUERY_COMMAND]
            }
        }
    })
}

async fn execute_command(ctx: &AppContext, params: Option<&Value>) -> Result<Value> {
    let command = params
        .and_then(|p| p.get("command"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    if command != QUERY_COMMAND {
        return Ok(json!({ "error": format!("Unknown command: {}", command) }));
    }

    let empty = Map::new();
    let args = params
        .and_then(|p| p.get("arguments"))
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
    if query.trim().is_empty() {
        return Ok(json!({ "error": "No query provided" }));
    }

    let top_k = args
        .get("top_k")
        .and_then(Value::as_u64)
        .map(|k| k as usize)
        .unwrap_or(ctx.retrieval.default_top_k)
        .clamp(1, ctx.retrieval.max_top_k.max(1));

    info!("Executing {}: top_k={}", QUERY_COMMAND, top_k);

    match ctx.mcp_pipeline.answer(query, top_k).await {
        Ok(response) => {
            METRICS.record_query("mcp", true);
            Ok(Value::String(response.answer))
        }
        Err(e) => {
            METRICS.record_query("mcp", false);
            degrade(e).map(Value::String)
        }
    }
}

/// Generator-side failures become apology strings, everything else propagates
fn degrade(e: TwinError) -> Result<String> {
    match e {
        TwinError::GeneratorUnavailable(_) => {
            warn!("Generator not configured, returning apology");
            Ok(NOT_CONFIGURED_REPLY.to_string())
        }
        TwinError::Generation(_) | TwinError::Timeout(_, "generation") => {
            warn!("Generation failed: {}", e);
            Ok(GENERATION_FAILED_REPLY.to_string())
        }
        other => Err(other),
    }
}

/// Live store check for the command surface
///
/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<Value> {
    let mut body = Map::new();
    body.insert("status".to_string(), json!("ok"));
    body.insert("service".to_string(), json!("digital-twin-mcp"));

    match &ctx.mcp_store {
        Some(store) => {
            let connected = store.ping().await;
            body.insert(format!("{}_connected", store.backend()), json!(connected));
            if connected {
                if let Ok(count) = store.count().await {
                    body.insert("chunk_count".to_string(), json!(count));
                }
            }
        }
        None => {
            body.insert(format!("{}_connected", ctx.store_label), json!(false));
        }
    }

    body.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
    Json(Value::Object(body))
}
