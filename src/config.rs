//! Configuration for flashcard generation.
//!
//! Everything the pipeline needs from its environment (character budget, OCR
//! language, model choice, timeouts, request limits) lives in
//! [`GeneratorConfig`] and is passed in explicitly. Nothing is read from
//! process-global state once a config has been built, so tests can construct
//! as many independent generators as they like.

use crate::error::FlashcardError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default character budget for text sent to the model.
pub const DEFAULT_MAX_CHARS: usize = 15_000;

/// Default upload limit: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for a [`crate::FlashcardGenerator`].
///
/// Built via [`GeneratorConfig::builder()`] or using
/// [`GeneratorConfig::default()`].
///
/// # Example
/// ```rust
/// use flashgen::GeneratorConfig;
///
/// let config = GeneratorConfig::builder()
///     .max_chars(8_000)
///     .ocr_language("deu")
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_chars, 8_000);
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// Character budget for extracted and combined text. Default: 15 000.
    ///
    /// Counted in Unicode scalar values. Text over the budget is cut and the
    /// truncation marker appended after the cut.
    pub max_chars: usize,

    /// Tesseract language code used for image OCR. Default: `"eng"`.
    pub ocr_language: String,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.7.
    ///
    /// Card writing benefits from some variety in phrasing, unlike
    /// transcription tasks that want temperature near zero.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Completion call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Card count used when the caller does not supply one. Default: 10.
    pub default_card_count: i64,

    /// Largest card count accepted by [`crate::FlashcardGenerator::generate_flashcards`]. Default: 50.
    pub max_card_count: i64,

    /// Upload size limit in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Explicit path to the pdfium shared library. Falls back to
    /// `PDFIUM_LIB_PATH`, the working directory, then the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// Tesseract executable. Default: `"tesseract"` (resolved via `PATH`).
    pub tesseract_command: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            ocr_language: "eng".to_string(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 4096,
            system_prompt: None,
            api_timeout_secs: 60,
            default_card_count: 10,
            max_card_count: 50,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            pdfium_library_path: None,
            tesseract_command: "tesseract".to_string(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("max_chars", &self.max_chars)
            .field("ocr_language", &self.ocr_language)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("default_card_count", &self.default_card_count)
            .field("max_card_count", &self.max_card_count)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("tesseract_command", &self.tesseract_command)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn max_chars(mut self, n: usize) -> Self {
        self.config.max_chars = n;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn default_card_count(mut self, n: i64) -> Self {
        self.config.default_card_count = n;
        self
    }

    pub fn max_card_count(mut self, n: i64) -> Self {
        self.config.max_card_count = n;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn tesseract_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.tesseract_command = cmd.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, FlashcardError> {
        let c = &self.config;
        if c.max_chars == 0 {
            return Err(FlashcardError::InvalidConfig(
                "Character budget must be ≥ 1".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(FlashcardError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.max_card_count < 1 {
            return Err(FlashcardError::InvalidConfig(format!(
                "Maximum card count must be ≥ 1, got {}",
                c.max_card_count
            )));
        }
        if c.default_card_count < 1 || c.default_card_count > c.max_card_count {
            return Err(FlashcardError::InvalidConfig(format!(
                "Default card count must be 1–{}, got {}",
                c.max_card_count, c.default_card_count
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(FlashcardError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
