use crate::error::ServerResult;
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// Body of `POST /search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Defaults to the configured `default_top_k`.
    #[serde(default)]
    pub top_k: Option<i64>,
}

/// Rank documents by similarity to the query text.
///
/// Responds with `{"source": "indexed" | "brute_force", "results": [...]}`.
pub async fn search_documents(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(req) = body?;
    let outcome = state.search.search(&req.query, req.top_k).await?;
    Ok(Json(outcome))
}
