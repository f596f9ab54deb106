use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "model": state.settings.gemini.embedding_model,
        "dimension": state.embedder.dimension(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct GenerateEmbeddingsRequest {
    pub texts: Vec<String>,
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateEmbeddingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.texts.is_empty() {
        return Err(ApiError::Validation("no texts provided".into()));
    }
    let embeddings = state.embedder.embed_batch(&req.texts).await?;
    Ok(Json(json!({
        "count": embeddings.len(),
        "dimension": state.embedder.dimension(),
        "embeddings": embeddings,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SingleEmbeddingRequest {
    pub text: String,
}

pub async fn single(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SingleEmbeddingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".into()));
    }
    let embedding = state.embedder.embed(&req.text).await?;
    Ok(Json(json!({
        "dimension": embedding.len(),
        "embedding": embedding,
    })))
}
