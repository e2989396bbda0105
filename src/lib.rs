//! # flashgen
//!
//! Turn study material (typed notes, PDFs, photos of slides) into
//! question/answer flashcards with a language model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text and/or file
//!  │
//!  ├─ 1. Extract    PDF text via pdfium, images via tesseract OCR
//!  ├─ 2. Normalize  collapse whitespace, merge sources, cap at 15 000 chars
//!  ├─ 3. Generate   one chat completion asking for N cards as JSON
//!  └─ 4. Coerce     repair and reshape the answer into a FlashcardBatch
//! ```
//!
//! Every stage runs in sequence; any failure ends the request with a
//! [`FlashcardError`] and no partial result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flashgen::{FlashcardGenerator, FlashcardRequest, GeneratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let generator = FlashcardGenerator::new(GeneratorConfig::default())?;
//!     let cards = generator
//!         .generate_flashcards(FlashcardRequest {
//!             text: Some("Mitochondria produce ATP through cellular respiration.".into()),
//!             count: Some(3),
//!             ..Default::default()
//!         })
//!         .await?;
//!     for card in &cards {
//!         println!("Q: {}\nA: {}\n", card.front, card.back);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `flashgen` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | Enables [`server`], the axum HTTP service behind `flashgen serve` |
//!
//! Disable both when using only the library:
//! ```toml
//! flashgen = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GeneratorConfig, GeneratorConfigBuilder};
pub use error::{CollaboratorResult, EngineUnavailable, ExtractionKind, FlashcardError};
pub use generate::{generate_sync, Collaborators, FlashcardGenerator};
pub use output::{
    Flashcard, FlashcardBatch, FlashcardRequest, GenerationOutput, GenerationRequest,
    GenerationStats, SourceInput, UploadedFile,
};
pub use pipeline::extract::{OcrEngine, PdfTextExtractor};
pub use pipeline::llm::{CompletionProvider, CompletionRequest, CompletionResponse, ResponseFormat};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
