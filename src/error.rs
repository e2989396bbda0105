//! Error types for the flashgen library.
//!
//! Every failure is terminal for the request that hit it: the pipeline never
//! returns a partial [`crate::output::FlashcardBatch`]. The first six variants
//! of [`FlashcardError`] are the pipeline's own taxonomy, one per way a stage
//! can fail. The remaining variants belong to the surfaces around the core
//! (request validation, input resolution, provider setup, file output).
//!
//! Collaborators (PDF parser, OCR engine, completion API) report their own
//! failures as a boxed error through [`CollaboratorResult`]; the pipeline
//! wraps those into the matching taxonomy variant with a readable detail.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type returned by the external collaborator traits.
pub type CollaboratorResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Returned by a collaborator when its engine could not be started at all
/// (pdfium library missing, OCR binary not on `PATH`). The pipeline reports
/// this as [`FlashcardError::Internal`] rather than blaming the upload.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EngineUnavailable(pub String);

/// Which extraction path failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    Pdf,
    Image,
}

impl fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionKind::Pdf => f.write_str("PDF parsing"),
            ExtractionKind::Image => f.write_str("OCR processing"),
        }
    }
}

/// All errors returned by the flashgen library.
#[derive(Debug, Error)]
pub enum FlashcardError {
    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The uploaded file is neither `application/pdf` nor an `image/*` type.
    #[error("Unsupported file type '{mime_type}'. Please upload a PDF, PNG, or JPG file.")]
    UnsupportedMediaType { mime_type: String },

    /// The PDF parser or OCR engine rejected the file.
    #[error("{kind} error: {detail}")]
    ExtractionFailure { kind: ExtractionKind, detail: String },

    /// Neither typed text nor extracted text carried any content.
    #[error("No text content provided or extracted.")]
    EmptyContent,

    /// The completion API returned an error or did not answer in time.
    #[error("Failed to generate flashcards: {message}")]
    GenerationFailure { message: String },

    /// The model answered with something that is not a recognisable card list.
    #[error("Invalid response format from the model: {detail}")]
    MalformedModelResponse { detail: String },

    /// The model answered with a well-formed but empty card list.
    #[error("The model did not generate any flashcards.")]
    NoFlashcardsGenerated,

    // ── Request errors ────────────────────────────────────────────────────
    /// Requested card count is outside `1..=max`.
    #[error("Card count must be between 1 and {max}, got {count}")]
    InvalidCardCount { count: i64, max: i64 },

    /// Upload exceeds the configured size limit.
    #[error("File is too large: {size} bytes (limit is {limit} bytes)")]
    FileTooLarge { size: usize, limit: usize },

    /// The request body was cut off at the transport limit before the
    /// upload size could be known.
    #[error("Upload exceeds the size limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The request body could not be understood.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── Provider / config errors ──────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlashcardError {
    /// Stable snake_case identifier, suitable for logs and API clients.
    pub fn code(&self) -> &'static str {
        match self {
            FlashcardError::UnsupportedMediaType { .. } => "unsupported_media_type",
            FlashcardError::ExtractionFailure { .. } => "extraction_failure",
            FlashcardError::EmptyContent => "empty_content",
            FlashcardError::GenerationFailure { .. } => "generation_failure",
            FlashcardError::MalformedModelResponse { .. } => "malformed_model_response",
            FlashcardError::NoFlashcardsGenerated => "no_flashcards_generated",
            FlashcardError::InvalidCardCount { .. } => "invalid_card_count",
            FlashcardError::FileTooLarge { .. } => "file_too_large",
            FlashcardError::BodyTooLarge { .. } => "body_too_large",
            FlashcardError::InvalidRequest(_) => "invalid_request",
            FlashcardError::FileNotFound { .. } => "file_not_found",
            FlashcardError::DownloadFailed { .. } => "download_failed",
            FlashcardError::ProviderNotConfigured { .. } => "provider_not_configured",
            FlashcardError::InvalidConfig(_) => "invalid_config",
            FlashcardError::OutputWriteFailed { .. } => "output_write_failed",
            FlashcardError::Internal(_) => "internal",
        }
    }
}
