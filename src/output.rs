//! Request and result types.

use crate::error::FlashcardError;
use serde::{Deserialize, Serialize};

/// Placeholder used when the model omits a card's question.
pub const MISSING_FRONT: &str = "Question not available";

/// Placeholder used when the model omits a card's answer.
pub const MISSING_BACK: &str = "Answer not available";

/// A file submitted for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    /// Declared MIME type, e.g. `application/pdf` or `image/png`.
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl UploadedFile {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Name for log lines.
    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("<upload>")
    }
}

/// What the caller gave us to make cards from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    Text(String),
    File(UploadedFile),
    Both { text: String, file: UploadedFile },
}

impl SourceInput {
    /// Build a source from optional parts.
    ///
    /// Blank text counts as absent. With nothing left this fails with
    /// [`FlashcardError::EmptyContent`].
    pub fn from_parts(
        text: Option<String>,
        file: Option<UploadedFile>,
    ) -> Result<Self, FlashcardError> {
        let text = text.filter(|t| !t.trim().is_empty());
        match (text, file) {
            (Some(text), Some(file)) => Ok(SourceInput::Both { text, file }),
            (Some(text), None) => Ok(SourceInput::Text(text)),
            (None, Some(file)) => Ok(SourceInput::File(file)),
            (None, None) => Err(FlashcardError::EmptyContent),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            SourceInput::Text(text) | SourceInput::Both { text, .. } => Some(text),
            SourceInput::File(_) => None,
        }
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        match self {
            SourceInput::File(file) | SourceInput::Both { file, .. } => Some(file),
            SourceInput::Text(_) => None,
        }
    }
}

/// Caller-facing request: the shape accepted by the HTTP service and the CLI.
#[derive(Debug, Clone, Default)]
pub struct FlashcardRequest {
    pub text: Option<String>,
    pub file: Option<UploadedFile>,
    /// Requested number of cards; `None` means the configured default.
    pub count: Option<i64>,
}

/// What the Generator sends to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub content: String,
    pub card_count: i64,
}

/// One question/answer card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    /// Unique within its batch.
    pub id: String,
    pub front: String,
    pub back: String,
    /// Recall marker set by study sessions; always `None` on generation.
    pub known: Option<bool>,
}

/// The ordered cards produced by one generation call.
///
/// Never empty. Serialises as a bare JSON array of cards; deserialising an
/// empty array fails the same way generation does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Flashcard>", into = "Vec<Flashcard>")]
pub struct FlashcardBatch {
    cards: Vec<Flashcard>,
}

impl FlashcardBatch {
    pub(crate) fn new(cards: Vec<Flashcard>) -> Result<Self, FlashcardError> {
        if cards.is_empty() {
            return Err(FlashcardError::NoFlashcardsGenerated);
        }
        Ok(Self { cards })
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Always false for a batch returned by the pipeline.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Flashcard> {
        self.cards.iter()
    }

    pub fn into_cards(self) -> Vec<Flashcard> {
        self.cards
    }
}

impl TryFrom<Vec<Flashcard>> for FlashcardBatch {
    type Error = FlashcardError;

    fn try_from(cards: Vec<Flashcard>) -> Result<Self, Self::Error> {
        Self::new(cards)
    }
}

impl From<FlashcardBatch> for Vec<Flashcard> {
    fn from(batch: FlashcardBatch) -> Self {
        batch.cards
    }
}

impl<'a> IntoIterator for &'a FlashcardBatch {
    type Item = &'a Flashcard;
    type IntoIter = std::slice::Iter<'a, Flashcard>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}

/// Timing and size figures for one generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Characters sent to the model after normalisation.
    pub content_chars: usize,
    /// Whether the content was cut to the character budget.
    pub truncated: bool,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub extraction_ms: u64,
    pub llm_ms: u64,
    pub total_ms: u64,
}

/// A batch plus the stats of the call that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub batch: FlashcardBatch,
    pub stats: GenerationStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_requires_some_content() {
        let err = SourceInput::from_parts(None, None).unwrap_err();
        assert!(matches!(err, FlashcardError::EmptyContent));

        let err = SourceInput::from_parts(Some("  \n\t".into()), None).unwrap_err();
        assert!(matches!(err, FlashcardError::EmptyContent));
    }

    #[test]
    fn from_parts_keeps_both_sources() {
        let file = UploadedFile::new(b"%PDF-1.7".to_vec(), "application/pdf");
        let src = SourceInput::from_parts(Some("notes".into()), Some(file.clone())).unwrap();
        assert_eq!(src.text(), Some("notes"));
        assert_eq!(src.file(), Some(&file));
    }

    #[test]
    fn blank_text_with_file_is_file_only() {
        let file = UploadedFile::new(vec![1, 2, 3], "image/png");
        let src = SourceInput::from_parts(Some(" ".into()), Some(file)).unwrap();
        assert!(matches!(src, SourceInput::File(_)));
    }

    #[test]
    fn empty_batch_is_an_error() {
        let err = FlashcardBatch::new(vec![]).unwrap_err();
        assert!(matches!(err, FlashcardError::NoFlashcardsGenerated));
    }

    #[test]
    fn empty_json_array_is_not_a_batch() {
        let err = serde_json::from_str::<FlashcardBatch>("[]").unwrap_err();
        assert!(err.to_string().contains("did not generate any flashcards"));

        let batch: FlashcardBatch =
            serde_json::from_str(r#"[{"id":"card-1-0","front":"Q","back":"A","known":true}]"#)
                .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.cards()[0].known, Some(true));
    }

    #[test]
    fn batch_serialises_as_bare_array_with_null_known() {
        let batch = FlashcardBatch::new(vec![Flashcard {
            id: "card-1-0".into(),
            front: "Q".into(),
            back: "A".into(),
            known: None,
        }])
        .unwrap();
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"id": "card-1-0", "front": "Q", "back": "A", "known": null}])
        );
    }
}
