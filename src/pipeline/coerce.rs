//! Response coercion: whatever JSON the model returned → [`FlashcardBatch`].
//!
//! Models asked for `{"cards": [...]}` do not always comply. Observed shapes
//! include a bare array, a `flashcards` key instead of `cards`, and
//! `question`/`answer` instead of `front`/`back`, sometimes wrapped in a
//! Markdown code fence. Coercion runs in three steps:
//!
//! 1. **Repair**: trim and strip one outer ```` ```json ```` fence.
//! 2. **Locate**: try [`CARD_LIST_SHAPES`] in order; the first matcher that
//!    finds an array wins.
//! 3. **Build**: map each element to a [`Flashcard`], substituting the
//!    placeholders for missing fields.

use crate::error::FlashcardError;
use crate::output::{Flashcard, FlashcardBatch, MISSING_BACK, MISSING_FRONT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// A named matcher that finds the card list inside a parsed response.
pub struct CardListShape {
    pub name: &'static str,
    pub locate: fn(&Value) -> Option<&Vec<Value>>,
}

/// Recognised response shapes, highest precedence first.
pub const CARD_LIST_SHAPES: &[CardListShape] = &[
    CardListShape {
        name: "bare array",
        locate: bare_array,
    },
    CardListShape {
        name: "cards",
        locate: cards_field,
    },
    CardListShape {
        name: "flashcards",
        locate: flashcards_field,
    },
];

fn bare_array(value: &Value) -> Option<&Vec<Value>> {
    value.as_array()
}

fn cards_field(value: &Value) -> Option<&Vec<Value>> {
    value.get("cards").and_then(Value::as_array)
}

fn flashcards_field(value: &Value) -> Option<&Vec<Value>> {
    value.get("flashcards").and_then(Value::as_array)
}

/// Find the card list, returning the name of the shape that matched.
pub fn locate_card_list(value: &Value) -> Option<(&'static str, &Vec<Value>)> {
    CARD_LIST_SHAPES
        .iter()
        .find_map(|shape| (shape.locate)(value).map(|list| (shape.name, list)))
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Strip one Markdown code fence wrapping the whole response.
fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

/// First usable text among `keys`: a non-empty string, or a number/bool
/// rendered as text.
fn field_text(card: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match card.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Coerce the model's raw text into a batch, stamping ids with the current time.
pub fn coerce_response(raw: &str) -> Result<FlashcardBatch, FlashcardError> {
    coerce_response_at(raw, chrono::Utc::now().timestamp_millis())
}

/// Like [`coerce_response`] with an explicit id timestamp.
pub fn coerce_response_at(raw: &str, timestamp_ms: i64) -> Result<FlashcardBatch, FlashcardError> {
    let repaired = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(repaired).map_err(|e| FlashcardError::MalformedModelResponse {
            detail: format!("response is not valid JSON: {e}"),
        })?;

    let (shape, list) =
        locate_card_list(&value).ok_or_else(|| FlashcardError::MalformedModelResponse {
            detail: "expected an array of flashcards or an object with a cards array".into(),
        })?;
    debug!("Model response matched shape '{}' with {} items", shape, list.len());

    let cards = list
        .iter()
        .enumerate()
        .map(|(index, item)| Flashcard {
            id: format!("card-{timestamp_ms}-{index}"),
            front: field_text(item, &["front", "question"])
                .unwrap_or_else(|| MISSING_FRONT.to_string()),
            back: field_text(item, &["back", "answer"])
                .unwrap_or_else(|| MISSING_BACK.to_string()),
            known: None,
        })
        .collect();

    FlashcardBatch::new(cards)
}
