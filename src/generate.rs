//! The pipeline driver: source in, flashcards out.
//!
//! [`FlashcardGenerator`] owns the configuration and the three external
//! collaborators and runs extract → normalize → generate → coerce strictly
//! in sequence for each call. It is cheap to clone and safe to share
//! between concurrent requests; nothing mutable is shared.

use crate::config::GeneratorConfig;
use crate::error::FlashcardError;
use crate::output::{
    FlashcardBatch, FlashcardRequest, GenerationOutput, GenerationRequest, GenerationStats,
    SourceInput,
};
use crate::pipeline::coerce::coerce_response;
use crate::pipeline::extract::{
    extract_text, OcrEngine, PdfTextExtractor, PdfiumTextExtractor, TesseractOcr,
};
use crate::pipeline::llm::{generate_raw, CompletionProvider, LlmCompletion};
use crate::pipeline::normalize::combine_sources;
use crate::progress::{GenerationProgressCallback, Stage};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// The external services the pipeline depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub pdf: Arc<dyn PdfTextExtractor>,
    pub ocr: Arc<dyn OcrEngine>,
    pub completion: Arc<dyn CompletionProvider>,
}

impl Collaborators {
    /// pdfium, tesseract and an edgequake-llm provider, as the config asks.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, FlashcardError> {
        let provider = resolve_provider(config)?;
        Ok(Self {
            pdf: Arc::new(PdfiumTextExtractor::from_config(config)),
            ocr: Arc::new(TesseractOcr::from_config(config)),
            completion: Arc::new(LlmCompletion::new(provider)),
        })
    }
}

/// Generates flashcards from text and uploaded files.
///
/// # Example
/// ```rust,no_run
/// use flashgen::{FlashcardGenerator, FlashcardRequest, GeneratorConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let generator = FlashcardGenerator::new(GeneratorConfig::default())?;
/// let batch = generator
///     .generate_flashcards(FlashcardRequest {
///         text: Some("Photosynthesis converts light energy into chemical energy.".into()),
///         count: Some(2),
///         ..Default::default()
///     })
///     .await?;
/// println!("{}", serde_json::to_string_pretty(&batch)?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FlashcardGenerator {
    config: Arc<GeneratorConfig>,
    collaborators: Collaborators,
}

impl std::fmt::Debug for FlashcardGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashcardGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FlashcardGenerator {
    /// Create a generator backed by the real collaborators.
    ///
    /// # Errors
    /// [`FlashcardError::ProviderNotConfigured`] when no LLM provider can be
    /// resolved from the config or the environment.
    pub fn new(config: GeneratorConfig) -> Result<Self, FlashcardError> {
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::with_collaborators(config, collaborators))
    }

    /// Create a generator with caller-supplied collaborators.
    pub fn with_collaborators(config: GeneratorConfig, collaborators: Collaborators) -> Self {
        Self {
            config: Arc::new(config),
            collaborators,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Run the pipeline for one source.
    ///
    /// `card_count` is forwarded to the model as given; range checks belong
    /// to [`Self::generate_flashcards`].
    pub async fn generate(
        &self,
        source: &SourceInput,
        card_count: i64,
    ) -> Result<GenerationOutput, FlashcardError> {
        let total_start = Instant::now();
        let config = self.config.as_ref();

        // ── Step 1: Extract ──────────────────────────────────────────────────
        let extract_start = Instant::now();
        let extracted = match source.file() {
            Some(file) => {
                self.notify(|cb| cb.on_stage_start(Stage::Extract));
                let result = extract_text(
                    file,
                    self.collaborators.pdf.as_ref(),
                    self.collaborators.ocr.as_ref(),
                    config,
                )
                .await;
                Some(self.finish_stage(Stage::Extract, extract_start, result)?)
            }
            None => None,
        };
        let extraction_ms = extract_start.elapsed().as_millis() as u64;

        // ── Step 2: Normalize ────────────────────────────────────────────────
        let normalize_start = Instant::now();
        self.notify(|cb| cb.on_stage_start(Stage::Normalize));
        let result = combine_sources(source.text(), extracted.as_deref(), config.max_chars);
        let (content, truncated) = self.finish_stage(Stage::Normalize, normalize_start, result)?;
        if truncated {
            warn!(
                "Content exceeded {} characters and was truncated",
                config.max_chars
            );
        }

        // ── Step 3: Generate ─────────────────────────────────────────────────
        let request = GenerationRequest {
            content,
            card_count,
        };
        let llm_start = Instant::now();
        self.notify(|cb| cb.on_stage_start(Stage::Generate));
        let result = generate_raw(self.collaborators.completion.as_ref(), &request, config).await;
        let response = self.finish_stage(Stage::Generate, llm_start, result)?;
        let llm_ms = llm_start.elapsed().as_millis() as u64;

        // ── Step 4: Coerce ───────────────────────────────────────────────────
        let coerce_start = Instant::now();
        self.notify(|cb| cb.on_stage_start(Stage::Coerce));
        let result = coerce_response(&response.content);
        let batch = self.finish_stage(Stage::Coerce, coerce_start, result)?;

        let stats = GenerationStats {
            content_chars: request.content.chars().count(),
            truncated,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            extraction_ms,
            llm_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Generated {} flashcards (requested {}) in {}ms",
            batch.len(),
            card_count,
            stats.total_ms
        );
        self.notify(|cb| cb.on_generation_complete(batch.len()));

        Ok(GenerationOutput { batch, stats })
    }

    /// Handle a caller request: default and validate the count, enforce the
    /// upload limit, then run [`Self::generate`].
    pub async fn generate_flashcards(
        &self,
        request: FlashcardRequest,
    ) -> Result<FlashcardBatch, FlashcardError> {
        Ok(self.generate_with_stats(request).await?.batch)
    }

    /// Like [`Self::generate_flashcards`], keeping the stats.
    pub async fn generate_with_stats(
        &self,
        request: FlashcardRequest,
    ) -> Result<GenerationOutput, FlashcardError> {
        let (source, count) = self.prepare(request)?;
        self.generate(&source, count).await
    }

    /// Generate and write the batch as pretty JSON to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn generate_to_file(
        &self,
        request: FlashcardRequest,
        output_path: impl AsRef<Path>,
    ) -> Result<GenerationStats, FlashcardError> {
        let output = self.generate_with_stats(request).await?;
        let path = output_path.as_ref();
        let write_failed = |source: std::io::Error| FlashcardError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_vec_pretty(&output.batch)
            .map_err(|e| FlashcardError::Internal(format!("serialising batch: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(write_failed)?;
        }

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(write_failed)?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(write_failed)?;

        debug!("Wrote {} cards to {}", output.batch.len(), path.display());
        Ok(output.stats)
    }

    fn prepare(&self, request: FlashcardRequest) -> Result<(SourceInput, i64), FlashcardError> {
        let config = self.config.as_ref();

        let count = request.count.unwrap_or(config.default_card_count);
        if count < 1 || count > config.max_card_count {
            return Err(FlashcardError::InvalidCardCount {
                count,
                max: config.max_card_count,
            });
        }

        if let Some(ref file) = request.file {
            if file.bytes.len() > config.max_upload_bytes {
                return Err(FlashcardError::FileTooLarge {
                    size: file.bytes.len(),
                    limit: config.max_upload_bytes,
                });
            }
        }

        let source = SourceInput::from_parts(request.text, request.file)?;
        Ok((source, count))
    }

    fn notify(&self, event: impl FnOnce(&dyn GenerationProgressCallback)) {
        if let Some(ref cb) = self.config.progress_callback {
            event(cb.as_ref());
        }
    }

    /// Report a stage outcome to the progress callback and pass it on.
    fn finish_stage<T>(
        &self,
        stage: Stage,
        started: Instant,
        result: Result<T, FlashcardError>,
    ) -> Result<T, FlashcardError> {
        match &result {
            Ok(_) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!("Stage {} finished in {}ms", stage, elapsed_ms);
                self.notify(|cb| cb.on_stage_complete(stage, elapsed_ms));
            }
            Err(e) => {
                warn!("Stage {} failed: {}", stage, e);
                let message = e.to_string();
                self.notify(|cb| cb.on_stage_error(stage, &message));
            }
        }
        result
    }
}

/// Synchronous wrapper around [`FlashcardGenerator::generate_flashcards`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    config: GeneratorConfig,
    request: FlashcardRequest,
) -> Result<FlashcardBatch, FlashcardError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| FlashcardError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    let generator = FlashcardGenerator::new(config)?;
    runtime.block_on(generator.generate_flashcards(request))
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, FlashcardError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        FlashcardError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured before auto-detection so the model choice sticks when several
///    API keys are present.
/// 4. **Auto-detection**: OpenAI if `OPENAI_API_KEY` is set, otherwise
///    whatever `ProviderFactory::from_env` finds.
pub fn resolve_provider(config: &GeneratorConfig) -> Result<Arc<dyn LLMProvider>, FlashcardError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| FlashcardError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorResult;
    use crate::output::UploadedFile;
    use crate::pipeline::llm::{CompletionRequest, CompletionResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoPdf;

    #[async_trait]
    impl PdfTextExtractor for NoPdf {
        async fn extract(&self, _: &[u8]) -> CollaboratorResult<String> {
            Err("unexpected PDF call".into())
        }
    }

    struct NoOcr;

    #[async_trait]
    impl OcrEngine for NoOcr {
        async fn recognize(&self, _: &[u8], _: &str) -> CollaboratorResult<String> {
            Err("unexpected OCR call".into())
        }
    }

    #[derive(Default)]
    struct CountingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for CountingModel {
        async fn complete(&self, _: &CompletionRequest) -> CollaboratorResult<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse::text(r#"{"cards":[{"front":"Q","back":"A"}]}"#))
        }
    }

    fn generator(model: Arc<CountingModel>) -> FlashcardGenerator {
        let config = GeneratorConfig::builder()
            .max_upload_bytes(8)
            .build()
            .unwrap();
        FlashcardGenerator::with_collaborators(
            config,
            Collaborators {
                pdf: Arc::new(NoPdf),
                ocr: Arc::new(NoOcr),
                completion: model,
            },
        )
    }

    #[tokio::test]
    async fn count_defaults_when_missing() {
        let model = Arc::new(CountingModel::default());
        let gen = generator(Arc::clone(&model));
        let (_, count) = gen
            .prepare(FlashcardRequest {
                text: Some("notes".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(count, 10);
    }

    #[tokio::test]
    async fn out_of_range_counts_are_rejected_before_any_call() {
        let model = Arc::new(CountingModel::default());
        let gen = generator(Arc::clone(&model));
        for count in [0, -4, 51] {
            let err = gen
                .generate_flashcards(FlashcardRequest {
                    text: Some("notes".into()),
                    count: Some(count),
                    ..Default::default()
                })
                .await
                .unwrap_err();
            assert!(matches!(err, FlashcardError::InvalidCardCount { .. }), "{count}");
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let model = Arc::new(CountingModel::default());
        let gen = generator(Arc::clone(&model));
        let err = gen
            .generate_flashcards(FlashcardRequest {
                file: Some(UploadedFile::new(vec![0u8; 9], "application/pdf")),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FlashcardError::FileTooLarge { size: 9, limit: 8 }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stats_describe_the_call() {
        let model = Arc::new(CountingModel::default());
        let gen = generator(Arc::clone(&model));
        let out = gen
            .generate(&SourceInput::Text("Cells divide.".into()), 1)
            .await
            .unwrap();
        assert_eq!(out.batch.len(), 1);
        assert_eq!(out.stats.content_chars, "Cells divide.".len());
        assert!(!out.stats.truncated);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generate_to_file_writes_a_json_array() {
        let model = Arc::new(CountingModel::default());
        let gen = generator(model);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/cards.json");

        gen.generate_to_file(
            FlashcardRequest {
                text: Some("Cells divide.".into()),
                count: Some(1),
                ..Default::default()
            },
            &path,
        )
        .await
        .unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written[0]["front"], "Q");
        assert!(written[0]["known"].is_null());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
