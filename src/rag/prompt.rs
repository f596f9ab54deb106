//! Prompt assembly for the generator.

/// Default instruction used for RAG-grounded chats.
pub const DEFAULT_RAG_INSTRUCTION: &str = "You are a helpful AI assistant. \
Use the provided context to answer questions accurately. If the context \
doesn't contain relevant information, say so and provide a general answer.";

/// Builds the three-part prompt: optional system instruction, optional
/// context, then the question, joined by blank lines. Blank or
/// whitespace-only sections are omitted. Pure function.
pub fn compose(
    user_message: &str,
    context: Option<&str>,
    system_instruction: Option<&str>,
) -> String {
    let mut parts = Vec::new();

    if let Some(instruction) = system_instruction {
        if !instruction.trim().is_empty() {
            parts.push(format!("System: {instruction}"));
        }
    }
    if let Some(context) = context {
        if !context.trim().is_empty() {
            parts.push(format!("Context: {context}"));
        }
    }
    parts.push(format!("Question: {user_message}"));

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_only() {
        assert_eq!(compose("hi", None, None), "Question: hi");
    }

    #[test]
    fn full_prompt_orders_sections() {
        let prompt = compose("what is x?", Some("x is 42"), Some("be brief"));
        assert_eq!(
            prompt,
            "System: be brief\n\nContext: x is 42\n\nQuestion: what is x?"
        );
    }

    #[test]
    fn blank_sections_are_omitted() {
        assert_eq!(compose("q", Some(""), Some("   ")), "Question: q");
        assert_eq!(compose("q", Some("ctx"), None), "Context: ctx\n\nQuestion: q");
    }

    #[test]
    fn instruction_without_context() {
        assert_eq!(
            compose("q", None, Some("be brief")),
            "System: be brief\n\nQuestion: q"
        );
    }
}
