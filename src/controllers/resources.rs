//! Generic collection CRUD over the document store.
//!
//! Any collection present in the store file is served here. Paths are the
//! internal ones (`/products/1`); the public `/api/...` paths reach these
//! handlers through the route rewriter.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::{
    error::ApiError,
    middleware::JsonBody,
    models::{document::field_string, Document},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{collection}", get(list_documents).post(create_document))
        .route(
            "/{collection}/{id}",
            get(get_document)
                .put(replace_document)
                .patch(update_document)
                .delete(delete_document),
        )
}

// --- Helpers ---

fn object_body(payload: Value) -> Result<Document, ApiError> {
    match payload {
        Value::Object(document) => Ok(document),
        _ => Err(ApiError::BadRequest("Request body must be a JSON object".to_string())),
    }
}

/// Lists a collection keeping documents whose fields equal the query values.
/// Repeated keys are alternatives; keys starting with `_` are not filters.
pub async fn list_filtered(
    state: &AppState,
    collection: &str,
    filters: &[(String, String)],
) -> Result<Vec<Document>, ApiError> {
    let mut documents = state.db.list(collection).await?;

    let mut by_field: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (field, value) in filters {
        if !field.starts_with('_') {
            by_field.entry(field.as_str()).or_default().push(value.as_str());
        }
    }

    if !by_field.is_empty() {
        documents.retain(|doc| {
            by_field.iter().all(|(field, accepted)| {
                doc.get(*field)
                    .and_then(field_string)
                    .is_some_and(|actual| accepted.contains(&actual.as_str()))
            })
        });
    }

    Ok(documents)
}

// --- Handlers ---

/// GET /{collection}
async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(filters): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Document>>, ApiError> {
    list_filtered(&state, &collection, &filters).await.map(Json)
}

/// GET /{collection}/{id}
async fn get_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    state
        .db
        .get(&collection, &id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// POST /{collection}
async fn create_document(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    JsonBody(payload): JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let document = object_body(payload)?;
    let stored = state.db.insert(&collection, document).await?;
    info!("Created document in {}: {:?}", collection, stored.get("id"));
    Ok((StatusCode::CREATED, Json(stored)))
}

/// PUT /{collection}/{id}
async fn replace_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    JsonBody(payload): JsonBody,
) -> Result<Json<Document>, ApiError> {
    let replacement = object_body(payload)?;
    state
        .db
        .replace(&collection, &id, replacement)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// PATCH /{collection}/{id}
async fn update_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
    JsonBody(payload): JsonBody,
) -> Result<Json<Document>, ApiError> {
    let changes = object_body(payload)?;
    state
        .db
        .update(&collection, &id, changes)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// DELETE /{collection}/{id}
async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    match state.db.remove(&collection, &id).await? {
        Some(_) => {
            info!("Deleted {}/{}", collection, id);
            Ok(Json(json!({})))
        }
        None => Err(ApiError::NotFound),
    }
}
