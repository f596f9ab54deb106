use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, documents, embeddings, health, uploads};
use crate::server::middleware;
use crate::state::AppState;

/// Multipart framing overhead allowed on top of the configured file cap.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.app.allowed_origins);
    let body_limit = state.settings.upload.max_file_size_bytes + BODY_LIMIT_SLACK;

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route(
            "/documents",
            post(documents::add_documents).get(documents::list_documents),
        )
        .route("/documents/search", get(documents::search_documents))
        .route("/documents/supported-types", get(documents::supported_types))
        .route("/documents/stats", get(documents::stats))
        .route("/documents/reset", post(documents::reset_collection))
        .route("/documents/upload", post(uploads::upload_single))
        .route("/documents/upload-multiple", post(uploads::upload_multiple))
        .route(
            "/documents/:document_id",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/embeddings/info", get(embeddings::info))
        .route("/embeddings/generate", post(embeddings::generate))
        .route("/embeddings/single", post(embeddings::single))
        .route("/chat", post(chat::chat))
        .route(
            "/conversations/:conversation_id",
            get(chat::get_conversation).delete(chat::delete_conversation),
        )
        .layer(from_fn(middleware::security_headers))
        .layer(from_fn(middleware::process_time))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}
