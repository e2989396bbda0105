//! Extraction: uploaded file bytes → cleaned plain text.
//!
//! The actual decoding is delegated to two collaborators, one per supported
//! media family. Both sit behind traits so the pipeline can be driven by test
//! doubles; the production implementations are [`PdfiumTextExtractor`] and
//! [`TesseractOcr`].
//!
//! ```text
//! application/pdf ──▶ PdfTextExtractor ──▶ collapse whitespace ──┐
//!                                                                 ├─▶ truncate
//! image/*         ──▶ OcrEngine        ──▶ collapse whitespace ──┘
//! ```
//!
//! Any other MIME type is rejected before a collaborator is called. There is
//! no retry: one failed collaborator call fails the request.

use crate::config::GeneratorConfig;
use crate::error::{CollaboratorResult, EngineUnavailable, ExtractionKind, FlashcardError};
use crate::output::UploadedFile;
use crate::pipeline::encode;
use crate::pipeline::normalize::{collapse_whitespace, truncate_with_marker};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Extracts the text layer of a PDF.
#[async_trait]
pub trait PdfTextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> CollaboratorResult<String>;
}

/// Recognises text in an image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, bytes: &[u8], language: &str) -> CollaboratorResult<String>;
}

/// Media families the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Image,
}

impl MediaKind {
    /// Classify a MIME type. Case and parameters (`; charset=…`) are ignored.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if essence == "application/pdf" {
            Some(MediaKind::Pdf)
        } else if essence.starts_with("image/") {
            Some(MediaKind::Image)
        } else {
            None
        }
    }
}

/// Turn an uploaded file into cleaned, budget-bounded text.
pub async fn extract_text(
    file: &UploadedFile,
    pdf: &dyn PdfTextExtractor,
    ocr: &dyn OcrEngine,
    config: &GeneratorConfig,
) -> Result<String, FlashcardError> {
    let kind = MediaKind::from_mime(&file.mime_type).ok_or_else(|| {
        FlashcardError::UnsupportedMediaType {
            mime_type: file.mime_type.clone(),
        }
    })?;

    info!(
        "Extracting text from {} ({}, {} bytes)",
        file.display_name(),
        file.mime_type,
        file.bytes.len()
    );

    let raw = match kind {
        MediaKind::Pdf => pdf
            .extract(&file.bytes)
            .await
            .map_err(|e| collaborator_failure(ExtractionKind::Pdf, e))?,
        MediaKind::Image => ocr
            .recognize(&file.bytes, &config.ocr_language)
            .await
            .map_err(|e| collaborator_failure(ExtractionKind::Image, e))?,
    };

    let cleaned = collapse_whitespace(&raw);
    let (text, truncated) = truncate_with_marker(&cleaned, config.max_chars);
    debug!(
        "Extracted {} characters (truncated: {})",
        text.chars().count(),
        truncated
    );
    Ok(text)
}

/// A missing engine is a server fault; anything else is the file's.
fn collaborator_failure(
    kind: ExtractionKind,
    err: Box<dyn std::error::Error + Send + Sync>,
) -> FlashcardError {
    if err.is::<EngineUnavailable>() {
        FlashcardError::Internal(format!("{kind} engine unavailable: {err}"))
    } else {
        FlashcardError::ExtractionFailure {
            kind,
            detail: err.to_string(),
        }
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// PDF text extraction through pdfium.
///
/// Library lookup order: the configured path, `PDFIUM_LIB_PATH`, the working
/// directory, then the system library. pdfium is not async-safe, so every
/// call runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextExtractor {
    library_path: Option<PathBuf>,
}

impl PdfiumTextExtractor {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.pdfium_library_path.clone())
    }
}

#[async_trait]
impl PdfTextExtractor for PdfiumTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> CollaboratorResult<String> {
        let bytes = bytes.to_vec();
        let library_path = self.library_path.clone();
        tokio::task::spawn_blocking(move || extract_pdf_blocking(&bytes, library_path.as_deref()))
            .await
            .map_err(|e| format!("PDF task panicked: {e}"))?
    }
}

fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, PdfiumError> {
    let explicit = library_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => Pdfium::bind_to_library(&path)?,
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())?,
    };
    Ok(Pdfium::new(bindings))
}

fn extract_pdf_blocking(bytes: &[u8], library_path: Option<&Path>) -> CollaboratorResult<String> {
    let pdfium = bind_pdfium(library_path)
        .map_err(|e| EngineUnavailable(format!("failed to bind pdfium library: {e}")))?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| format!("{e:?}"))?;

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut text = String::new();
    for page in pages.iter() {
        let page_text = page.text().map_err(|e| format!("{e:?}"))?;
        text.push_str(&page_text.all());
        text.push('\n');
    }
    Ok(text)
}

// ── tesseract ────────────────────────────────────────────────────────────

/// OCR through the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.tesseract_command.clone())
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, bytes: &[u8], language: &str) -> CollaboratorResult<String> {
        let owned = bytes.to_vec();
        let png = tokio::task::spawn_blocking(move || encode::prepare_for_ocr(&owned))
            .await
            .map_err(|e| format!("image task panicked: {e}"))??;

        // Removed with the TempDir when this function returns.
        let dir = tempfile::TempDir::new()?;
        let image_path = dir.path().join("upload.png");
        tokio::fs::write(&image_path, &png).await?;

        let output = Command::new(&self.command)
            .arg(&image_path)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()
            .await
            .map_err(|e| EngineUnavailable(format!("failed to run '{}': {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("tesseract exited with {}: {}", output.status, stderr.trim()).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
