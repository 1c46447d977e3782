use crate::error::{ServerError, ServerResult};
use crate::routes::run_blocking;
use crate::state::ServerState;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use store::{Collection, Entity};

const MAX_ID_LEN: usize = 128;

/// Query parameters for collection listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn parse_collection(name: &str) -> ServerResult<Collection> {
    Ok(name.parse::<Collection>()?)
}

/// Identifiers are 1 to 128 characters from `[A-Za-z0-9_-]`.
pub fn validate_id(id: &str) -> ServerResult<()> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(ServerError::InvalidArgument(format!(
            "id must be 1..={MAX_ID_LEN} characters"
        )));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(ServerError::InvalidArgument(format!(
            "id '{id}' contains characters outside [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}

/// `GET /{collection}?offset=&limit=`
pub async fn list_records(
    State(state): State<Arc<ServerState>>,
    path: Result<Path<String>, PathRejection>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ServerResult<impl IntoResponse> {
    let Path(name) = path?;
    let Query(params) = params?;
    let collection = parse_collection(&name)?;

    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(state.config.default_page_limit);
    let max = state.config.max_page_limit;
    if limit == 0 || limit > max {
        return Err(ServerError::InvalidArgument(format!(
            "limit must be within 1..={max}, got {limit}"
        )));
    }

    let store = state.store.clone();
    let items = run_blocking(move || store.list(collection, offset, limit)).await?;

    Ok(Json(json!({
        "collection": collection,
        "offset": offset,
        "limit": limit,
        "count": items.len(),
        "items": items,
    })))
}

/// `GET /{collection}/{id}`
pub async fn get_record(
    State(state): State<Arc<ServerState>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ServerResult<impl IntoResponse> {
    let Path((name, id)) = path?;
    let collection = parse_collection(&name)?;
    validate_id(&id)?;

    let store = state.store.clone();
    let lookup = id.clone();
    match run_blocking(move || store.get(collection, &lookup)).await? {
        Some(entity) => Ok(Json(entity)),
        None => Err(ServerError::NotFound(format!(
            "{collection} record '{id}' not found"
        ))),
    }
}

/// `POST /{collection}`: validate, assign a fresh identifier, store, echo.
pub async fn create_record(
    State(state): State<Arc<ServerState>>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Path(name) = path?;
    let collection = parse_collection(&name)?;
    let Json(value) = body?;
    if !value.is_object() {
        return Err(ServerError::InvalidArgument(
            "request body must be a JSON object".into(),
        ));
    }

    let mut entity = Entity::from_value(collection, value)?;
    // Client-supplied identifiers are replaced.
    entity.set_id(uuid::Uuid::new_v4().to_string());

    let store = state.store.clone();
    let stored = run_blocking(move || store.insert(entity)).await?;
    tracing::debug!(collection = %collection, id = stored.id(), "record created");

    Ok((StatusCode::CREATED, Json(stored)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert!(validate_id("M0001").is_ok());
        assert!(validate_id("6f1c2b9e-7d4a-4c1e-9a3b-0e2d5f6a7b8c").is_ok());
        assert!(validate_id("snake_case_id").is_ok());
    }

    #[test]
    fn test_invalid_ids() {
        assert!(validate_id("").is_err());
        assert!(validate_id("a b").is_err());
        assert!(validate_id("id$").is_err());
        assert!(validate_id("ñandú").is_err());
        assert!(validate_id(&"x".repeat(129)).is_err());
        assert!(validate_id(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn test_unknown_collection_is_not_found() {
        let err = parse_collection("recetas").unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }
}
