//! File-text extraction for upload ingestion.
//!
//! Dispatches on the file extension to a format-specific parser and
//! guards the endpoint with an extension whitelist plus a size cap.

mod docx;
mod html;
mod pdf;
mod sheet;

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::core::errors::ApiError;

const SUPPORTED: [(&str, &str); 9] = [
    (".pdf", "application/pdf"),
    (
        ".docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (".txt", "text/plain"),
    (".md", "text/markdown"),
    (
        ".xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (".xls", "application/vnd.ms-excel"),
    (".csv", "text/csv"),
    (".html", "text/html"),
    (".htm", "text/html"),
];

pub fn supported_extensions() -> Vec<String> {
    SUPPORTED.iter().map(|(ext, _)| ext.to_string()).collect()
}

pub fn supported_mime_types() -> Vec<String> {
    let mut types: Vec<String> = SUPPORTED.iter().map(|(_, mime)| mime.to_string()).collect();
    types.dedup();
    types
}

pub fn is_supported(filename: &str) -> bool {
    extension(filename)
        .map(|ext| SUPPORTED.iter().any(|(e, _)| *e == ext))
        .unwrap_or(false)
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

fn mime_type(filename: &str) -> String {
    extension(filename)
        .and_then(|ext| {
            SUPPORTED
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, mime)| mime.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Whitelist and size checks, applied before any parsing.
pub fn validate(filename: &str, size: usize, max_size: usize) -> Result<(), ApiError> {
    if !is_supported(filename) {
        return Err(ApiError::UnsupportedFileType {
            filename: filename.to_string(),
            supported: supported_extensions(),
        });
    }
    if size > max_size {
        return Err(ApiError::FileTooLarge {
            filename: filename.to_string(),
            size,
            max_size,
        });
    }
    Ok(())
}

/// Extracts plain text from the raw bytes, per extension.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ApiError> {
    let ext = extension(filename).unwrap_or_default();
    let result = match ext.as_str() {
        ".pdf" => pdf::extract(bytes),
        ".docx" => docx::extract(bytes),
        ".xlsx" | ".xls" => sheet::extract_workbook(bytes),
        ".csv" => sheet::extract_csv(bytes),
        ".html" | ".htm" => html::extract(bytes),
        ".txt" | ".md" => String::from_utf8(bytes.to_vec())
            .map_err(|_| "file is not valid UTF-8".to_string()),
        _ => {
            return Err(ApiError::UnsupportedFileType {
                filename: filename.to_string(),
                supported: supported_extensions(),
            })
        }
    };

    result.map_err(|reason| ApiError::FileProcessing {
        filename: filename.to_string(),
        reason,
    })
}

/// Metadata attached to every ingested upload.
pub fn ingestion_metadata(filename: &str, file_size: usize, text_length: usize) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("filename".to_string(), json!(filename));
    metadata.insert("file_type".to_string(), json!(mime_type(filename)));
    metadata.insert("file_size".to_string(), json!(file_size));
    metadata.insert(
        "processed_at".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
    metadata.insert("text_length".to_string(), json!(text_length));
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_whitelist() {
        assert!(is_supported("report.PDF"));
        assert!(is_supported("notes.md"));
        assert!(is_supported("index.htm"));
        assert!(!is_supported("slides.pptx"));
        assert!(!is_supported("archive.zip"));
        assert!(!is_supported("no_extension"));
    }

    #[test]
    fn validate_rejects_unsupported_and_oversized() {
        assert!(matches!(
            validate("x.exe", 10, 100),
            Err(ApiError::UnsupportedFileType { .. })
        ));
        assert!(matches!(
            validate("x.txt", 101, 100),
            Err(ApiError::FileTooLarge { .. })
        ));
        assert!(validate("x.txt", 100, 100).is_ok());
    }

    #[test]
    fn plain_text_roundtrips() {
        let text = extract_text("hello\nworld".as_bytes(), "notes.txt").expect("text");
        assert_eq!(text, "hello\nworld");
    }

    #[test]
    fn invalid_utf8_text_is_a_processing_error() {
        let err = extract_text(&[0xff, 0xfe, 0x00], "bad.txt");
        assert!(matches!(err, Err(ApiError::FileProcessing { .. })));
    }

    #[test]
    fn metadata_names_the_file() {
        let metadata = ingestion_metadata("a.pdf", 2048, 512);
        assert_eq!(metadata["filename"], json!("a.pdf"));
        assert_eq!(metadata["file_type"], json!("application/pdf"));
        assert_eq!(metadata["file_size"], json!(2048));
        assert_eq!(metadata["text_length"], json!(512));
    }
}
