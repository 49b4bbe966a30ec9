//! Router wiring for both surfaces

use super::state::AppContext;
use super::{handlers, mcp};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the service router
pub fn build_router(ctx: AppContext, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/query", post(handlers::query))
        .route("/mcp", post(mcp::handle_mcp))
        .route("/health", get(mcp::health))
        .route("/metrics", get(handlers::metrics))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(ctx)
}
