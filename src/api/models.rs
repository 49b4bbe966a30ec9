//! Wire types for the HTTP and command surfaces

use crate::error::TwinError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the HTTP surface
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// Human-readable diagnostic
    pub detail: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: code.into(),
            detail: message.clone(),
            message,
        }
    }
}

impl From<&TwinError> for ApiError {
    fn from(e: &TwinError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
            detail: format!("Error processing query: {}", e),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceFlags {
    pub generator: bool,
    pub store: bool,
    pub vector_db: bool,
    pub kv_store: bool,
}

/// `GET /api/health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub services: ServiceFlags,
}

/// JSON-RPC 2.0 request from an editor-integration client
#[derive(Debug, Deserialize)]
pub struct McpRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpErrorObject {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC envelope; `id` mirrors the request
#[derive(Debug, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpErrorObject>,
    pub id: Option<Value>,
}

/// Internal JSON-RPC error code
pub const INTERNAL_ERROR: i64 = -32603;

impl McpResponse {
    pub fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(McpErrorObject {
                code: INTERNAL_ERROR,
                message: message.into(),
            }),
            id,
        }
    }
}
