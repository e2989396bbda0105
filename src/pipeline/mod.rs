//! Pipeline stages for flashcard generation.
//!
//! Each submodule implements one step and is testable on its own, with the
//! external collaborators (PDF parser, OCR engine, completion API) behind
//! traits.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ normalize ──▶ llm ──▶ coerce
//! (PDF/OCR)   (merge, cap)  (model) (JSON → cards)
//! ```
//!
//! 1. [`extract`]   — file bytes → cleaned text via pdfium or tesseract
//! 2. [`normalize`] — merge typed and extracted text, enforce the budget
//! 3. [`llm`]       — build the prompt and make the single completion call
//! 4. [`coerce`]    — repair and reshape the model's JSON into a batch
//!
//! [`input`] (path/URL resolution) and [`encode`] (image prep for OCR) are
//! helpers for the first stage.

pub mod coerce;
pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
