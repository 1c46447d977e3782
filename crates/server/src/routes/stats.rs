use crate::error::ServerResult;
use crate::routes::run_blocking;
use crate::state::ServerState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// `GET /stats`: record count per collection plus vector index status.
pub async fn collection_stats(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let store = state.store.clone();
    let counts = run_blocking(move || store.counts()).await?;

    let total: usize = counts.values().sum();
    let collections: BTreeMap<&str, usize> =
        counts.into_iter().map(|(c, n)| (c.name(), n)).collect();

    Ok(Json(json!({
        "collections": collections,
        "total": total,
        "vector_index": state.store.vector_index_status(),
    })))
}

/// `POST /vector-index/rebuild`: rebuild the HNSW index from stored embeddings.
pub async fn rebuild_vector_index(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let store = state.store.clone();
    let status = run_blocking(move || store.build_vector_index()).await?;
    tracing::info!(
        state = ?status.state,
        vectors = status.vectors,
        "vector index rebuilt"
    );
    Ok(Json(status))
}
