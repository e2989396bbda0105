//! Text normalisation: whitespace collapse, character budget, source merge.
//!
//! The budget is a crude stand-in for the model's context window. It is
//! counted in `char`s so a cut never lands inside a multi-byte character.

use crate::error::FlashcardError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Appended to any text cut to the character budget.
///
/// The marker itself is not counted against the budget.
pub const TRUNCATION_MARKER: &str = "... [content truncated due to length]";

/// Separator placed between typed text and extracted text.
pub const SOURCE_SEPARATOR: &str = "\n\n";

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every whitespace run (newlines included) to one space and trim.
pub fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}

/// Cut `input` to `max_chars` characters and append [`TRUNCATION_MARKER`].
///
/// Returns the text and whether it was cut. Input within budget is returned
/// unchanged.
pub fn truncate_with_marker(input: &str, max_chars: usize) -> (String, bool) {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + TRUNCATION_MARKER.len());
            out.push_str(&input[..byte_idx]);
            out.push_str(TRUNCATION_MARKER);
            (out, true)
        }
        None => (input.to_string(), false),
    }
}

/// Merge typed text and extracted text into the content sent to the model.
///
/// Typed text goes first. The merged text is cut to the budget again, since
/// a full-length extract plus typed notes can exceed it.
pub fn combine_sources(
    text: Option<&str>,
    extracted: Option<&str>,
    max_chars: usize,
) -> Result<(String, bool), FlashcardError> {
    let combined = match (text, extracted) {
        (Some(t), Some(e)) => format!("{t}{SOURCE_SEPARATOR}{e}"),
        (Some(only), None) | (None, Some(only)) => only.to_string(),
        (None, None) => return Err(FlashcardError::EmptyContent),
    };

    if combined.trim().is_empty() {
        return Err(FlashcardError::EmptyContent);
    }

    Ok(truncate_with_marker(&combined, max_chars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_whitespace_flattens_newlines_and_tabs() {
        assert_eq!(
            collapse_whitespace("  Chapter 1\n\n\tCells\r\n are   small  "),
            "Chapter 1 Cells are small"
        );
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }

    #[test]
    fn truncate_leaves_short_text_alone() {
        let (out, cut) = truncate_with_marker("short", 10);
        assert_eq!(out, "short");
        assert!(!cut);

        let (out, cut) = truncate_with_marker("exactly10!", 10);
        assert_eq!(out, "exactly10!");
        assert!(!cut);
    }

    #[test]
    fn truncate_appends_marker_past_budget() {
        let input = "a".repeat(15_001);
        let (out, cut) = truncate_with_marker(&input, 15_000);
        assert!(cut);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            out.chars().count(),
            15_000 + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let input = "é".repeat(12);
        let (out, cut) = truncate_with_marker(&input, 10);
        assert!(cut);
        assert_eq!(out, format!("{}{}", "é".repeat(10), TRUNCATION_MARKER));
    }

    #[test]
    fn combine_uses_double_newline_text_first() {
        let (out, cut) = combine_sources(Some("A"), Some("B"), 15_000).unwrap();
        assert_eq!(out, "A\n\nB");
        assert!(!cut);
    }

    #[test]
    fn combine_single_source_is_unchanged() {
        let (out, _) = combine_sources(Some("  typed  "), None, 100).unwrap();
        assert_eq!(out, "  typed  ");
        let (out, _) = combine_sources(None, Some("extracted"), 100).unwrap();
        assert_eq!(out, "extracted");
    }

    #[test]
    fn combine_rejects_nothing_and_blank() {
        assert!(matches!(
            combine_sources(None, None, 100),
            Err(FlashcardError::EmptyContent)
        ));
        assert!(matches!(
            combine_sources(Some(" "), Some("\n"), 100),
            Err(FlashcardError::EmptyContent)
        ));
    }

    #[test]
    fn combine_retruncates_an_already_truncated_extract() {
        let (extract, _) = truncate_with_marker(&"x".repeat(20), 10);
        let (out, cut) = combine_sources(Some("notes"), Some(&extract), 10).unwrap();
        assert!(cut);
        assert_eq!(out, format!("notes\n\nxxx{TRUNCATION_MARKER}"));
        assert!(out.chars().count() <= 10 + TRUNCATION_MARKER.chars().count());
    }
}
