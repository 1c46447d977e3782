//! API route handlers
//!
//! - `health`: liveness, readiness, metrics
//! - `search`: similarity search
//! - `collections`: per-collection create / read / list
//! - `stats`: counts and vector index management

pub mod collections;
pub mod health;
pub mod search;
pub mod stats;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use store::{Collection, StoreError};

/// API version and base info
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    let collections: Vec<&str> = Collection::ALL.iter().map(|c| c.name()).collect();
    Ok(Json(json!({
        "name": "Pharmacien Server",
        "version": env!("CARGO_PKG_VERSION"),
        "collections": collections,
        "endpoints": [
            "POST /search",
            "GET /{collection}",
            "GET /{collection}/{id}",
            "POST /{collection}",
            "GET /stats",
            "POST /vector-index/rebuild",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound("no such route".into())
}

/// Run store work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
