use lopdf::Document;

/// Per-page text, blank pages skipped, pages joined with a blank line.
pub fn extract(bytes: &[u8]) -> Result<String, String> {
    let doc = Document::load_mem(bytes).map_err(|e| format!("invalid pdf: {e}"))?;

    let mut parts = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Err(e) => {
                tracing::warn!("skipping pdf page {}: {}", page_number, e);
            }
        }
    }
    Ok(parts.join("\n\n"))
}
