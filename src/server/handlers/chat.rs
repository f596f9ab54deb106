use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::errors::ApiError;
use crate::history::ConversationMessage;
use crate::rag::context::RagContext;
use crate::rag::prompt;
use crate::rag::SourceRef;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_use_rag")]
    pub use_rag: bool,
    pub max_context_docs: Option<usize>,
    pub conversation_id: Option<String>,
    pub system_instruction: Option<String>,
}

fn default_use_rag() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceRef>>,
    pub rag_used: bool,
    pub conversation_id: String,
}

/// Chat with RAG: retrieve, assemble context, compose the prompt,
/// generate. Retrieval failure degrades to a context-free answer;
/// generation failure fails the request.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::Validation("message must not be empty".into()));
    }
    let conversation_id = req
        .conversation_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let limit = req
        .max_context_docs
        .unwrap_or(state.settings.rag.max_context_docs);

    let mut context: Option<RagContext> = None;
    if req.use_rag {
        match state.store.search(message, limit, None).await {
            Ok(matches) => {
                let assembled = state.assembler.assemble(&matches)?;
                tracing::info!(
                    "rag context: {}/{} docs, {} characters",
                    assembled.included_count,
                    assembled.total_found,
                    assembled.concatenated_text.len()
                );
                if assembled.is_empty() {
                    tracing::warn!("rag context is empty; no relevant documents found");
                } else {
                    context = Some(assembled);
                }
            }
            Err(err) => {
                tracing::warn!("retrieval failed, answering without context: {}", err);
            }
        }
    }

    let instruction = req.system_instruction.as_deref();
    let prompt = match &context {
        Some(ctx) => prompt::compose(
            message,
            Some(&ctx.concatenated_text),
            Some(instruction.unwrap_or(prompt::DEFAULT_RAG_INSTRUCTION)),
        ),
        None => prompt::compose(message, None, instruction),
    };

    let answer = state.generator.generate(&prompt).await?;

    state
        .conversations
        .append(
            &conversation_id,
            vec![
                ConversationMessage::new("user", message),
                ConversationMessage::new("assistant", &answer),
            ],
        )
        .await?;

    let rag_used = context.is_some();
    Ok(Json(ChatResponse {
        response: answer,
        sources: context.map(|ctx| ctx.sources),
        rag_used,
        conversation_id,
    }))
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state
        .conversations
        .get(&conversation_id)
        .await?
        .ok_or_else(|| conversation_not_found(&conversation_id))?;
    Ok(Json(conversation))
}

pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.conversations.delete(&conversation_id).await? {
        return Err(conversation_not_found(&conversation_id));
    }
    Ok(Json(json!({
        "message": "Conversation deleted",
        "conversation_id": conversation_id,
    })))
}

fn conversation_not_found(conversation_id: &str) -> ApiError {
    ApiError::NotFound(format!("Conversation '{conversation_id}' not found"))
}
