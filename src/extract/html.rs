use scraper::{Html, Selector};

/// Visible text flattened to a single space-joined string. Prefers the
/// body element when present so head metadata stays out of the index.
pub fn extract(bytes: &[u8]) -> Result<String, String> {
    let raw = String::from_utf8_lossy(bytes);
    let document = Html::parse_document(&raw);

    let body = Selector::parse("body").map_err(|e| format!("selector error: {e}"))?;
    let mut parts = Vec::new();
    match document.select(&body).next() {
        Some(body) => collect_text(body.text(), &mut parts),
        None => collect_text(document.root_element().text(), &mut parts),
    }
    Ok(parts.join(" "))
}

fn collect_text<'a>(texts: impl Iterator<Item = &'a str>, parts: &mut Vec<String>) {
    for text in texts {
        let text = text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stripped() {
        let html = b"<html><head><title>skip</title></head>\
                     <body><h1>Title</h1><p>Some <b>bold</b> text.</p></body></html>";
        let text = extract(html).expect("html");
        assert_eq!(text, "Title Some bold text.");
        assert!(!text.contains("skip"));
    }

    #[test]
    fn fragment_without_body_still_extracts() {
        let text = extract(b"plain words only").expect("html");
        assert!(text.contains("plain words only"));
    }
}
