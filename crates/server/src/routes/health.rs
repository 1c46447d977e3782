use crate::error::{ServerError, ServerResult};
use crate::routes::run_blocking;
use crate::state::{ServerMetadata, ServerState};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;
use store::Collection;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Health check endpoint (liveness)
pub async fn health_check() -> impl IntoResponse {
    let meta = ServerMetadata {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime_seconds(),
    };

    Json(json!({
        "status": "healthy",
        "service": "pharma-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": meta.version,
        "uptime_seconds": meta.uptime_seconds,
    }))
}

/// Readiness check endpoint; fails with 503 when the store cannot be read.
pub async fn readiness_check(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let store = state.store.clone();
    run_blocking(move || store.count(Collection::Documents)).await?;
    let index = state.store.vector_index_status();

    Ok(Json(json!({
        "status": "ready",
        "service": "pharma-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
        "components": {
            "store": "ready",
            "embedder": state.search.embedder().model_version(),
            "vector_index": index.state,
        }
    })))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    match &state.metrics {
        Some(handle) => Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], handle.render())),
        None => Err(ServerError::NotFound("metrics are disabled".into())),
    }
}
