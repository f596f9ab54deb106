use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild};

/// Paragraph text, empty paragraphs skipped, joined with a blank line.
pub fn extract(bytes: &[u8]) -> Result<String, String> {
    let docx = read_docx(bytes).map_err(|e| format!("invalid docx: {e}"))?;

    let mut parts = Vec::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            let text = paragraph_text(paragraph);
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }
    Ok(parts.join("\n\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(text) = run_child {
                    out.push_str(&text.text);
                }
            }
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = extract(b"not a zip archive").expect_err("should fail");
        assert!(err.contains("invalid docx"));
    }
}
