//! RAG context assembly.
//!
//! Filters retrieved matches by the distance threshold, concatenates the
//! surviving texts for the prompt, and produces preview snippets with
//! per-source scores for the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::store::RetrievedMatch;
use crate::core::errors::ApiError;

const ELLIPSIS: &str = "...";

/// One included source, reported back to the chat caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Text truncated to the configured preview length, in characters.
    pub preview: String,
    /// `1 − distance`, unclamped; can be negative for distances above 1.
    pub score: f64,
    pub metadata: Map<String, Value>,
}

/// Assembled context for one request. Invariants:
/// `included_count == sources.len()` and `included_count <= total_found`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagContext {
    pub concatenated_text: String,
    pub included_count: usize,
    pub total_found: usize,
    pub sources: Vec<SourceRef>,
}

impl RagContext {
    pub fn is_empty(&self) -> bool {
        self.concatenated_text.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    distance_threshold: f64,
    preview_length: usize,
}

impl ContextAssembler {
    pub fn new(distance_threshold: f64, preview_length: usize) -> Self {
        Self {
            distance_threshold,
            preview_length,
        }
    }

    /// Assembles a context from matches in retriever order (assumed
    /// best-first; no re-sorting). A match is included when
    /// `distance < distance_threshold`. No I/O; the only failure mode is
    /// a non-finite distance or threshold.
    pub fn assemble(&self, matches: &[RetrievedMatch]) -> Result<RagContext, ApiError> {
        if !self.distance_threshold.is_finite() {
            return Err(ApiError::Validation(format!(
                "distance threshold is not a finite number: {}",
                self.distance_threshold
            )));
        }

        let mut sources = Vec::new();
        let mut text_parts = Vec::new();

        for m in matches {
            if !m.distance.is_finite() {
                return Err(ApiError::Validation(format!(
                    "match '{}' has a non-finite distance: {}",
                    m.id, m.distance
                )));
            }
            if m.distance < self.distance_threshold {
                text_parts.push(m.text.as_str());
                sources.push(SourceRef {
                    preview: truncate_preview(&m.text, self.preview_length),
                    score: 1.0 - m.distance,
                    metadata: m.metadata.clone(),
                });
            }
        }

        Ok(RagContext {
            concatenated_text: text_parts.join("\n\n"),
            included_count: sources.len(),
            total_found: matches.len(),
            sources,
        })
    }
}

/// Character-based truncation with a trailing ellipsis marker, so
/// multi-byte text never splits a code point.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(max_chars).collect();
    preview.push_str(ELLIPSIS);
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_match(id: &str, text: &str, distance: f64) -> RetrievedMatch {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), json!(format!("{id}.txt")));
        RetrievedMatch {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
            distance,
        }
    }

    #[test]
    fn includes_exactly_the_matches_below_threshold() {
        let assembler = ContextAssembler::new(0.8, 150);
        let matches = vec![
            make_match("a", "first", 0.1),
            make_match("b", "second", 0.79),
            make_match("c", "third", 0.8),
            make_match("d", "fourth", 1.5),
        ];

        let ctx = assembler.assemble(&matches).expect("assemble");
        assert_eq!(ctx.included_count, 2);
        assert_eq!(ctx.total_found, 4);
        assert_eq!(ctx.sources.len(), ctx.included_count);
        assert_eq!(ctx.concatenated_text, "first\n\nsecond");
    }

    #[test]
    fn one_relevant_of_two() {
        let assembler = ContextAssembler::new(0.8, 150);
        let matches = vec![
            make_match("a", "relevant text", 0.2),
            make_match("b", "irrelevant text", 0.9),
        ];

        let ctx = assembler.assemble(&matches).expect("assemble");
        assert_eq!(ctx.included_count, 1);
        assert_eq!(ctx.concatenated_text, "relevant text");
        assert!((ctx.sources[0].score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn empty_matches_yield_empty_context() {
        let assembler = ContextAssembler::new(0.8, 150);
        let ctx = assembler.assemble(&[]).expect("assemble");
        assert_eq!(ctx.concatenated_text, "");
        assert_eq!(ctx.included_count, 0);
        assert_eq!(ctx.total_found, 0);
        assert!(ctx.sources.is_empty());
        assert!(ctx.is_empty());
    }

    #[test]
    fn zero_or_negative_threshold_excludes_everything() {
        let matches = vec![make_match("a", "text", 0.1)];
        for t in [0.0, -1.0] {
            let ctx = ContextAssembler::new(t, 150)
                .assemble(&matches)
                .expect("assemble");
            assert_eq!(ctx.included_count, 0);
            assert_eq!(ctx.total_found, 1);
        }
    }

    #[test]
    fn score_is_one_minus_distance_unclamped() {
        let assembler = ContextAssembler::new(2.0, 150);
        let matches = vec![make_match("a", "far", 1.6), make_match("b", "near", 0.25)];
        let ctx = assembler.assemble(&matches).expect("assemble");
        assert!((ctx.sources[0].score - (1.0 - 1.6)).abs() < 1e-12);
        assert!(ctx.sources[0].score < 0.0);
        assert!((ctx.sources[1].score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn preview_respects_length_invariant() {
        let assembler = ContextAssembler::new(1.0, 10);
        let long = "a".repeat(40);
        let ctx = assembler
            .assemble(&[make_match("a", &long, 0.1)])
            .expect("assemble");
        let preview = &ctx.sources[0].preview;
        assert_eq!(preview.chars().count(), 10 + ELLIPSIS.len());
        assert!(preview.ends_with(ELLIPSIS));
    }

    #[test]
    fn short_text_is_not_truncated() {
        assert_eq!(truncate_preview("short", 10), "short");
        assert_eq!(truncate_preview("exactly_10", 10), "exactly_10");
    }

    #[test]
    fn preview_truncation_counts_characters_not_bytes() {
        let text = "日本語のテキストです、長い文書の冒頭。";
        let preview = truncate_preview(text, 5);
        assert_eq!(preview, format!("日本語のテ{ELLIPSIS}"));
    }

    #[test]
    fn nan_distance_is_invalid_input() {
        let assembler = ContextAssembler::new(0.8, 150);
        let matches = vec![make_match("a", "text", f64::NAN)];
        assert!(matches!(
            assembler.assemble(&matches),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn nan_threshold_is_invalid_input() {
        let assembler = ContextAssembler::new(f64::NAN, 150);
        assert!(matches!(
            assembler.assemble(&[]),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn order_follows_the_retriever() {
        let assembler = ContextAssembler::new(1.0, 150);
        // deliberately not distance-sorted; the retriever's order wins
        let matches = vec![
            make_match("a", "second-best", 0.5),
            make_match("b", "best", 0.1),
        ];
        let ctx = assembler.assemble(&matches).expect("assemble");
        assert_eq!(ctx.concatenated_text, "second-best\n\nbest");
    }

    #[test]
    fn sources_carry_match_metadata() {
        let assembler = ContextAssembler::new(1.0, 150);
        let ctx = assembler
            .assemble(&[make_match("a", "text", 0.3)])
            .expect("assemble");
        assert_eq!(ctx.sources[0].metadata["source"], json!("a.txt"));
    }
}
