//! Prompts for flashcard generation.
//!
//! Callers can replace the system prompt via
//! [`crate::config::GeneratorConfig::system_prompt`]; the user prompt always
//! comes from [`flashcard_user_prompt`] because it carries the card count and
//! the content.

/// Default system prompt.
///
/// The schema named here is the first one the response coercer looks for.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant that creates educational flashcards from study material.

Rules:
- Each flashcard tests one fact, definition, or concept from the material.
- The front is a clear, self-contained question.
- The back is a concise, correct answer.
- Use only information present in the material.

Respond with a single JSON object of the form:
{"cards": [{"front": "question", "back": "answer"}]}
Do not add commentary or Markdown fences."#;

/// Build the user message asking for `card_count` cards about `content`.
///
/// The content is embedded verbatim; it has already been cut to the
/// character budget.
pub fn flashcard_user_prompt(content: &str, card_count: i64) -> String {
    format!(
        "Create exactly {card_count} flashcards from this text: \"{content}\". \
Format your response as: {{\"cards\": [{{\"front\": \"question\", \"back\": \"answer\"}}, ...]}}"
    )
}
