use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};

use crate::core::errors::ApiError;
use crate::extract;
use crate::state::AppState;

struct IngestedFile {
    document_id: String,
    filename: String,
    text_length: usize,
    metadata: Map<String, Value>,
}

pub async fn upload_single(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut metadata_raw: Option<String> = None;

    while let Some(field) = next_field(&mut multipart).await? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = read_field_bytes(field).await?;
                file = Some((filename, bytes));
            }
            Some("metadata") => metadata_raw = Some(read_field_text(field).await?),
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::Validation("missing 'file' field".into()))?;
    let user_metadata = metadata_raw.map(parse_metadata_field);

    let max_size = state.settings.upload.max_file_size_bytes;
    extract::validate(&filename, bytes.len(), max_size)?;
    let ingested = ingest_file(&state, &filename, &bytes, user_metadata).await?;

    Ok(Json(json!({
        "message": "File uploaded and processed successfully",
        "document_id": ingested.document_id,
        "filename": ingested.filename,
        "text_length": ingested.text_length,
        "metadata": ingested.metadata,
    })))
}

pub async fn upload_multiple(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut files: Vec<(String, Bytes)> = Vec::new();
    let mut metadatas_raw: Option<String> = None;

    while let Some(field) = next_field(&mut multipart).await? {
        match field.name() {
            Some("files") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = read_field_bytes(field).await?;
                files.push((filename, bytes));
            }
            Some("metadatas") => metadatas_raw = Some(read_field_text(field).await?),
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(ApiError::Validation("no files provided".into()));
    }

    // whitelist and size are checked for every file before any is ingested
    let max_size = state.settings.upload.max_file_size_bytes;
    for (filename, bytes) in &files {
        extract::validate(filename, bytes.len(), max_size)?;
    }

    let user_metadatas = parse_metadatas_field(metadatas_raw, files.len())?;

    let mut document_ids = Vec::new();
    let mut failed_files = Vec::new();
    for (i, (filename, bytes)) in files.iter().enumerate() {
        let user_metadata = user_metadatas.as_ref().map(|m| m[i].clone());
        match ingest_file(&state, filename, bytes, user_metadata).await {
            Ok(ingested) => document_ids.push(ingested.document_id),
            Err(err) => {
                tracing::warn!("failed to ingest '{}': {}", filename, err);
                failed_files.push(json!({ "filename": filename, "error": err.to_string() }));
            }
        }
    }

    Ok(Json(json!({
        "message": format!("Processed {} files", files.len()),
        "successful_uploads": document_ids.len(),
        "failed_uploads": failed_files.len(),
        "document_ids": document_ids,
        "failed_files": failed_files,
    })))
}

async fn next_field(
    multipart: &mut Multipart,
) -> Result<Option<axum::extract::multipart::Field<'_>>, ApiError> {
    multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))
}

async fn read_field_bytes(field: axum::extract::multipart::Field<'_>) -> Result<Bytes, ApiError> {
    field
        .bytes()
        .await
        .map_err(|e| ApiError::Validation(format!("failed to read upload: {e}")))
}

async fn read_field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("failed to read field: {e}")))
}

/// JSON object when it parses as one; any other string becomes a bare
/// source tag.
fn parse_metadata_field(raw: String) -> Map<String, Value> {
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert("source".to_string(), Value::String(raw));
            map
        }
    }
}

fn parse_metadatas_field(
    raw: Option<String>,
    file_count: usize,
) -> Result<Option<Vec<Map<String, Value>>>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(&raw)
        .map_err(|_| ApiError::Validation("'metadatas' is not valid JSON".into()))?;
    let Value::Array(items) = value else {
        return Err(ApiError::Validation("'metadatas' must be a JSON array".into()));
    };
    if items.len() != file_count {
        return Err(ApiError::Validation(format!(
            "got {} metadatas for {} files",
            items.len(),
            file_count
        )));
    }
    let metadatas = items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            _ => Err(ApiError::Validation(
                "'metadatas' entries must be JSON objects".into(),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(metadatas))
}

async fn ingest_file(
    state: &AppState,
    filename: &str,
    bytes: &[u8],
    user_metadata: Option<Map<String, Value>>,
) -> Result<IngestedFile, ApiError> {
    let text = extract::extract_text(bytes, filename)?;
    if text.trim().is_empty() {
        return Err(ApiError::FileProcessing {
            filename: filename.to_string(),
            reason: "no text content extracted".to_string(),
        });
    }

    let text_length = text.chars().count();
    let mut metadata = user_metadata.unwrap_or_default();
    // ingestion fields win over user-supplied keys of the same name
    metadata.extend(extract::ingestion_metadata(filename, bytes.len(), text_length));

    let ids = state
        .store
        .add(vec![text], Some(vec![metadata.clone()]), None)
        .await?;
    let document_id = ids
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("store returned no id for upload".into()))?;

    Ok(IngestedFile {
        document_id,
        filename: filename.to_string(),
        text_length,
        metadata,
    })
}
