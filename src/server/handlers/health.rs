use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": state.settings.app.name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Reports the vector store too, since every document endpoint depends
/// on it. Always 200; a dead store shows up as "degraded".
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = state.store.healthy().await;
    Json(json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "service": state.settings.app.name,
        "version": env!("CARGO_PKG_VERSION"),
        "vector_store": if store_ok { "connected" } else { "unreachable" },
    }))
}
