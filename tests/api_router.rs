//! Router tests for the HTTP and command surfaces

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use async_trait::async_trait;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use twin_rag::api::{build_router, AppContext, Backends};
use twin_rag::config::RetrievalConfig;
use twin_rag::facts::{FactChunk, FactStore, MemoryFactStore};
use twin_rag::generation::{CompletionRequest, TextGenerator};
use twin_rag::Result;

/// Generator with a fixed reply
struct FakeGenerator(String);

impl FakeGenerator {
    fn replying(reply: &str) -> Self {
        Self(reply.to_string())
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Ok(self.0.clone())
    }
}

fn profile_store() -> Arc<dyn FactStore> {
    Arc::new(MemoryFactStore::with_chunks(vec![
        FactChunk::new("c1", "Skills", "Python and distributed systems").with_kind("skill"),
        FactChunk::new("c2", "Education", "BSc in Computer Science").with_kind("education"),
    ]))
}

fn router(store: Option<Arc<dyn FactStore>>, generator: Option<Arc<dyn TextGenerator>>) -> Router {
    router_with(RetrievalConfig::default(), store, generator)
}

fn router_with(
    retrieval: RetrievalConfig,
    store: Option<Arc<dyn FactStore>>,
    generator: Option<Arc<dyn TextGenerator>>,
) -> Router {
    let backends = Backends {
        vector: None,
        store,
        generator,
    };
    let ctx = AppContext::new(backends, retrieval, Duration::from_secs(5), "memory");
    build_router(ctx, 64 * 1024)
}

fn default_router() -> Router {
    router(
        Some(profile_store()),
        Some(Arc::new(FakeGenerator::replying("I build distributed systems in Python."))),
    )
}

async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_mcp_initialize_mirrors_id() {
    let (status, body) = post_json(
        default_router(),
        "/mcp",
        r#"{"jsonrpc": "2.0", "method": "initialize", "id": 7}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 7);
    assert_eq!(body["jsonrpc"], "2.0");
    assert!(!body["result"]["capabilities"].is_null());
    assert_eq!(
        body["result"]["capabilities"]["executeCommandProvider"]["commands"],
        json!(["digitaltwin.query"])
    );
}

#[tokio::test]
async fn test_mcp_unsupported_method() {
    let (_, body) = post_json(default_router(), "/mcp", r#"{"jsonrpc": "2.0", "method": "foo", "id": 1}"#).await;

    assert!(body["result"]["error"]
        .as_str()
        .unwrap()
        .contains("Unsupported method: foo"));
}

#[tokio::test]
async fn test_mcp_unknown_command() {
    let request = json!({
        "jsonrpc": "2.0",
        "method": "workspace/executeCommand",
        "params": {"command": "digitaltwin.delete", "arguments": [{}]},
        "id": 2
    });
    let (_, body) = post_json(default_router(), "/mcp", &request.to_string()).await;

    assert_eq!(body["result"]["error"], "Unknown command: digitaltwin.delete");
}

#[tokio::test]
async fn test_mcp_query_returns_answer_string() {
    let request = json!({
        "jsonrpc": "2.0",
        "method": "workspace/executeCommand",
        "params": {"command": "digitaltwin.query", "arguments": [{"query": "skills"}]},
        "id": 3
    });
    let (_, body) = post_json(default_router(), "/mcp", &request.to_string()).await;

    assert_eq!(body["id"], 3);
    assert_eq!(body["result"], "I build distributed systems in Python.");
}

#[tokio::test]
async fn test_mcp_empty_query() {
    let request = json!({
        "jsonrpc": "2.0",
        "method": "workspace/executeCommand",
        "params": {"command": "digitaltwin.query", "arguments": [{"query": ""}]},
        "id": 4
    });
    let (_, body) = post_json(default_router(), "/mcp", &request.to_string()).await;

    assert_eq!(body["result"]["error"], "No query provided");
}

#[tokio::test]
async fn test_mcp_no_match_returns_canned_answer() {
    let request = json!({
        "jsonrpc": "2.0",
        "method": "workspace/executeCommand",
        "params": {"command": "digitaltwin.query", "arguments": [{"query": "kubernetes"}]},
        "id": 5
    });
    let (_, body) = post_json(default_router(), "/mcp", &request.to_string()).await;

    assert_eq!(body["result"], "I don't have specific information about that topic.");
}

#[tokio::test]
async fn test_mcp_missing_generator_degrades_to_apology() {
    let request = json!({
        "jsonrpc": "2.0",
        "method": "workspace/executeCommand",
        "params": {"command": "digitaltwin.query", "arguments": [{"query": "skills"}]},
        "id": 6
    });
    let (_, body) = post_json(router(Some(profile_store()), None), "/mcp", &request.to_string()).await;

    assert_eq!(
        body["result"],
        "I'm sorry, I couldn't process your request. The AI service is not configured."
    );
}

#[tokio::test]
async fn test_mcp_missing_store_is_envelope_error() {
    let request = json!({
        "jsonrpc": "2.0",
        "method": "workspace/executeCommand",
        "params": {"command": "digitaltwin.query", "arguments": [{"query": "skills"}]},
        "id": 8
    });
    let (_, body) = post_json(router(None, None), "/mcp", &request.to_string()).await;

    assert_eq!(body["id"], 8);
    assert_eq!(body["error"]["code"], -32603);
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn test_mcp_malformed_body() {
    let (status, body) = post_json(default_router(), "/mcp", "{not json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], -32603);
    assert!(body["id"].is_null());
}

#[tokio::test]
async fn test_mcp_missing_method_keeps_id() {
    let (_, body) = post_json(default_router(), "/mcp", r#"{"jsonrpc": "2.0", "id": 9}"#).await;

    assert_eq!(body["id"], 9);
    assert_eq!(body["error"]["code"], -32603);
}

#[tokio::test]
async fn test_http_query_end_to_end() {
    let (status, body) = post_json(
        default_router(),
        "/api/query",
        r#"{"question": "skills", "top_k": 1}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "I build distributed systems in Python.");

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["title"], "Skills");
    assert_eq!(sources[0]["score"], 1.0);
    assert_eq!(sources[0]["type"], "skill");
}

#[tokio::test]
async fn test_http_query_empty_question() {
    let (status, body) = post_json(default_router(), "/api/query", r#"{"question": "  "}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_http_query_missing_question_is_json_error() {
    let (status, body) = post_json(default_router(), "/api/query", r#"{"top_k": 3}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["detail"].as_str().unwrap().contains("question"));
}

#[tokio::test]
async fn test_http_query_unparseable_bodies_are_json_errors() {
    for raw in [r#"{"question": "skills", "top_k": -1}"#, "not json"] {
        let (status, body) = post_json(default_router(), "/api/query", raw).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", raw);
        assert_eq!(body["code"], "VALIDATION_ERROR", "body {}", raw);
        assert!(body["detail"].is_string());
    }
}

#[tokio::test]
async fn test_http_query_uses_configured_default_top_k() {
    let store: Arc<dyn FactStore> = Arc::new(MemoryFactStore::with_chunks(vec![
        FactChunk::new("c1", "Skills", "Python and distributed systems"),
        FactChunk::new("c2", "Projects", "Python tooling"),
    ]));
    let retrieval = RetrievalConfig {
        default_top_k: 1,
        ..RetrievalConfig::default()
    };
    let app = router_with(
        retrieval,
        Some(store),
        Some(Arc::new(FakeGenerator::replying("answer"))),
    );

    let (status, body) = post_json(app, "/api/query", r#"{"question": "python"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sources"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_http_query_top_k_out_of_range() {
    let (status, _) = post_json(
        default_router(),
        "/api/query",
        r#"{"question": "skills", "top_k": 500}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_http_query_missing_generator_is_server_error() {
    let (status, body) = post_json(
        router(Some(profile_store()), None),
        "/api/query",
        r#"{"question": "skills"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "GENERATOR_UNAVAILABLE");
    assert!(body["detail"].as_str().unwrap().starts_with("Error processing query"));
}

#[tokio::test]
async fn test_http_health_flags() {
    let (status, body) = get_json(router(Some(profile_store()), None), "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["services"]["generator"], false);
    assert_eq!(body["services"]["store"], true);
}

#[tokio::test]
async fn test_command_health_reports_store() {
    let (status, body) = get_json(default_router(), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "digital-twin-mcp");
    assert_eq!(body["memory_connected"], true);
    assert_eq!(body["chunk_count"], 2);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_command_health_without_store() {
    let (_, body) = get_json(router(None, None), "/health").await;

    assert_eq!(body["memory_connected"], false);
    assert!(body.get("chunk_count").is_none());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = default_router();
    post_json(app.clone(), "/api/query", r#"{"question": "skills"}"#).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("twin_query_requests_total"));
}
