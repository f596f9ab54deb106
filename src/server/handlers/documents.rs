use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::errors::ApiError;
use crate::extract;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddDocumentsRequest {
    pub documents: Vec<String>,
    pub metadatas: Option<Vec<Map<String, Value>>>,
    pub ids: Option<Vec<String>>,
}

pub async fn add_documents(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddDocumentsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auto_generated = req.ids.is_none();
    let ids = state.store.add(req.documents, req.metadatas, req.ids).await?;
    Ok(Json(json!({
        "message": format!("Successfully added {} documents", ids.len()),
        "document_ids": ids,
        "auto_generated_ids": auto_generated,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub n_results: Option<usize>,
    #[serde(rename = "where")]
    pub filter: Option<String>,
}

pub async fn search_documents(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.query.trim().is_empty() {
        return Err(ApiError::Validation("query must not be empty".into()));
    }
    let limit = params
        .n_results
        .unwrap_or(state.settings.rag.default_search_limit);
    let filter = params.filter.map(parse_where_filter).transpose()?;
    let matches = state.store.search(&params.query, limit, filter).await?;

    let results: Vec<Value> = matches
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "content": m.text,
                "metadata": m.metadata,
                "distance": m.distance,
            })
        })
        .collect();
    Ok(Json(json!({
        "query": params.query,
        "count": results.len(),
        "results": results,
    })))
}

/// The `where` parameter is a JSON object passed through to the store
/// untouched.
fn parse_where_filter(raw: String) -> Result<Map<String, Value>, ApiError> {
    let value: Value = serde_json::from_str(&raw)
        .map_err(|_| ApiError::Validation("'where' is not valid JSON".into()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::Validation("'where' must be a JSON object".into())),
    }
}

pub async fn supported_types(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let max_bytes = state.settings.upload.max_file_size_bytes;
    Json(json!({
        "supported_extensions": extract::supported_extensions(),
        "supported_mime_types": extract::supported_mime_types(),
        "max_file_size_mb": max_bytes as f64 / (1024.0 * 1024.0),
    }))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.stats().await?))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_list_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_list_limit() -> usize {
    100
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (documents, total) = state.store.list(params.limit, params.offset).await?;
    Ok(Json(json!({
        "documents": documents,
        "total": total,
        "limit": params.limit,
        "offset": params.offset,
    })))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let document = state
        .store
        .get(&document_id)
        .await?
        .ok_or_else(|| document_not_found(&document_id))?;
    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub document: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .store
        .update(&document_id, req.document, req.metadata)
        .await?;
    if !updated {
        return Err(document_not_found(&document_id));
    }
    Ok(Json(json!({
        "message": "Document updated successfully",
        "document_id": document_id,
    })))
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.store.delete(&document_id).await? {
        return Err(document_not_found(&document_id));
    }
    Ok(Json(json!({
        "message": "Document deleted successfully",
        "document_id": document_id,
    })))
}

pub async fn reset_collection(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.reset().await?;
    Ok(Json(json!({ "message": "Collection reset successfully" })))
}

fn document_not_found(document_id: &str) -> ApiError {
    ApiError::NotFound(format!("Document with ID '{document_id}' not found"))
}
