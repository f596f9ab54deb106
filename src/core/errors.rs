use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

/// Service-wide error type.
///
/// `Retrieval` and `Generation` surface collaborator failures unchanged;
/// the remaining variants cover request validation and the HTTP surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported file type: {filename}")]
    UnsupportedFileType {
        filename: String,
        supported: Vec<String>,
    },
    #[error("file too large: {filename}")]
    FileTooLarge {
        filename: String,
        size: usize,
        max_size: usize,
    },
    #[error("failed to process file '{filename}': {reason}")]
    FileProcessing { filename: String, reason: String },
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn retrieval<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Retrieval(err.to_string())
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::Retrieval(_) => "RetrievalError",
            ApiError::Generation(_) => "GenerationError",
            ApiError::NotFound(_) => "DocumentNotFoundError",
            ApiError::UnsupportedFileType { .. } => "UnsupportedFileTypeError",
            ApiError::FileTooLarge { .. } => "FileSizeExceededError",
            ApiError::FileProcessing { .. } => "DocumentProcessingError",
            ApiError::ServiceUnavailable(_) => "ServiceUnavailableError",
            ApiError::Internal(_) => "InternalServerError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::UnsupportedFileType { .. }
            | ApiError::FileTooLarge { .. }
            | ApiError::FileProcessing { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Retrieval(_) | ApiError::Generation(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ApiError::UnsupportedFileType {
                filename,
                supported,
            } => Some(json!({ "filename": filename, "supported_types": supported })),
            ApiError::FileTooLarge {
                filename,
                size,
                max_size,
            } => Some(json!({ "filename": filename, "file_size": size, "max_size": max_size })),
            ApiError::FileProcessing { filename, reason } => {
                Some(json!({ "filename": filename, "reason": reason }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}: {}", self.kind(), self);
        } else {
            tracing::warn!("{}: {}", self.kind(), self);
        }

        let mut error = json!({
            "type": self.kind(),
            "message": self.to_string(),
        });
        if let (Some(details), Some(obj)) = (self.details(), error.as_object_mut()) {
            obj.insert("details".to_string(), details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Retrieval("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::ServiceUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn upload_errors_carry_details() {
        let err = ApiError::FileTooLarge {
            filename: "big.pdf".into(),
            size: 100,
            max_size: 10,
        };
        let details = err.details().expect("details");
        assert_eq!(details["file_size"], 100);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
