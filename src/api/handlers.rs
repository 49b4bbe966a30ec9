//! HTTP query surface handlers

use super::models::{ApiError, HealthResponse, ServiceFlags};
use super::state::AppContext;
use crate::error::TwinError;
use crate::metrics::METRICS;
use crate::pipeline::{QueryRequest, QueryResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{error, info, warn};

/// Backend availability flags
///
/// GET /api/health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        services: ServiceFlags {
            generator: ctx.generator_ready,
            store: ctx.vector_ready || ctx.store_ready,
            vector_db: ctx.vector_ready,
            kv_store: ctx.store_ready,
        },
    })
}

/// Answer a question as the digital twin
///
/// POST /api/query
pub async fn query(
    State(ctx): State<AppContext>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<ApiError>)> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected query body: {}", rejection.body_text());
        METRICS.record_query("http", false);
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("VALIDATION_ERROR", rejection.body_text())),
        )
    })?;

    let top_k = request.top_k.unwrap_or(ctx.retrieval.default_top_k);
    info!("Query request: top_k={}", top_k);

    if request.question.trim().is_empty() {
        METRICS.record_query("http", false);
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("VALIDATION_ERROR", "Question cannot be empty")),
        ));
    }

    if top_k == 0 || top_k > ctx.retrieval.max_top_k {
        METRICS.record_query("http", false);
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                "VALIDATION_ERROR",
                format!("top_k must be between 1 and {}", ctx.retrieval.max_top_k),
            )),
        ));
    }

    match ctx.http_pipeline.answer(&request.question, top_k).await {
        Ok(response) => {
            METRICS.record_query("http", true);
            Ok(Json(response))
        }
        Err(e) => {
            error!("Query failed: {}", e);
            METRICS.record_query("http", false);
            Err((status_for(&e), Json(ApiError::from(&e))))
        }
    }
}

fn status_for(e: &TwinError) -> StatusCode {
    match e {
        TwinError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Prometheus text exposition
///
/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_prometheus(),
    )
}
