//! CLI binary for flashgen.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GeneratorConfig`, prints cards as JSON, or starts the HTTP service.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use flashgen::pipeline::input::resolve_file;
use flashgen::{
    FlashcardGenerator, FlashcardRequest, GenerationProgressCallback, GenerationStats,
    GeneratorConfig, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that names the running stage and logs each finished one.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Extract => "Reading file",
        Stage::Normalize => "Preparing text",
        Stage::Generate => "Asking the model",
        Stage::Coerce => "Parsing cards",
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage_label(stage));
        self.bar.set_message("…");
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<18} {}",
            green("✓"),
            stage_label(stage),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {:<18} {}", red("✗"), stage_label(stage), red(&msg)));
        self.bar.finish_and_clear();
    }

    fn on_generation_complete(&self, card_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} flashcards generated",
            green("✔"),
            bold(&card_count.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Cards from typed notes (JSON on stdout)
  flashgen generate --text "Photosynthesis converts light energy into chemical energy." -n 2

  # Cards from a PDF, written to a file
  flashgen generate --file lecture.pdf -n 15 -o cards.json

  # Photo of a whiteboard, German OCR
  flashgen generate --file board.jpg --ocr-language deu

  # Notes plus slides from a URL
  flashgen generate --text-file notes.md --file https://example.com/slides.pdf

  # HTTP service
  flashgen serve --bind 0.0.0.0:3000

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter, overrides -v / -q

  Every flag also reads a FLASHGEN_* variable (see --help per flag).

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. PDFs need libpdfium; images need the tesseract binary on PATH.
  3. Generate:        flashgen generate --file notes.pdf
"#;

/// Turn notes, PDFs and images into flashcards with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "flashgen",
    version,
    about = "Turn notes, PDFs and images into flashcards with an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FLASHGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FLASHGEN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate flashcards and print them as JSON.
    Generate(GenerateArgs),
    /// Serve the flashcard API over HTTP.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

/// Model and pipeline settings shared by both subcommands.
#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "FLASHGEN_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "FLASHGEN_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "FLASHGEN_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "FLASHGEN_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Character budget for text sent to the model.
    #[arg(long, env = "FLASHGEN_MAX_CHARS", default_value_t = flashgen::config::DEFAULT_MAX_CHARS)]
    max_chars: usize,

    /// Tesseract language code for image OCR.
    #[arg(long, env = "FLASHGEN_OCR_LANGUAGE", default_value = "eng")]
    ocr_language: String,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "FLASHGEN_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Path to the pdfium shared library.
    #[arg(long, env = "FLASHGEN_PDFIUM_PATH")]
    pdfium_path: Option<PathBuf>,

    /// Tesseract executable.
    #[arg(long, env = "FLASHGEN_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// LLM call timeout in seconds.
    #[arg(long, env = "FLASHGEN_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Largest accepted card count.
    #[arg(long, env = "FLASHGEN_MAX_CARDS", default_value_t = 50)]
    max_cards: i64,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Study text to make cards from.
    #[arg(long, env = "FLASHGEN_TEXT", conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the study text from this file.
    #[arg(long, env = "FLASHGEN_TEXT_FILE")]
    text_file: Option<PathBuf>,

    /// PDF or image to extract text from: local path or HTTP/HTTPS URL.
    #[arg(long, env = "FLASHGEN_FILE")]
    file: Option<String>,

    /// Override the detected MIME type of --file.
    #[arg(long, env = "FLASHGEN_MIME", requires = "file")]
    mime: Option<String>,

    /// Number of cards to ask for (default 10).
    #[arg(short = 'n', long, env = "FLASHGEN_COUNT")]
    count: Option<i64>,

    /// Write the cards to this JSON file instead of stdout.
    #[arg(short, long, env = "FLASHGEN_OUTPUT")]
    output: Option<PathBuf>,

    /// Print timing and token stats to stderr.
    #[arg(long, env = "FLASHGEN_STATS")]
    stats: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "FLASHGEN_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "FLASHGEN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    #[command(flatten)]
    model: ModelArgs,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "FLASHGEN_BIND", default_value = "0.0.0.0:3000")]
    bind: String,

    /// Browser origin allowed to call the API (CORS).
    #[arg(long, env = "FLASHGEN_ALLOWED_ORIGIN", default_value = "http://localhost:3001")]
    allowed_origin: String,

    /// Upload size limit in bytes.
    #[arg(long, env = "FLASHGEN_MAX_UPLOAD_BYTES", default_value_t = flashgen::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    #[command(flatten)]
    model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback a generate run needs, so INFO logs
    // are held back while it is shown.
    let show_progress = match &cli.command {
        Command::Generate(args) => !cli.quiet && !args.no_progress,
        #[cfg(feature = "server")]
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Generate(args) => run_generate(args, show_progress, cli.quiet).await,
        #[cfg(feature = "server")]
        Command::Serve(args) => run_serve(args).await,
    }
}

async fn run_generate(args: GenerateArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };

    let config = build_config(&args.model, progress_cb, |b| {
        b.download_timeout_secs(args.download_timeout)
    })
    .await?;
    let download_timeout = config.download_timeout_secs;
    let generator = FlashcardGenerator::new(config).context("Failed to set up the generator")?;

    // ── Gather inputs ────────────────────────────────────────────────────
    let text = match (&args.text, &args.text_file) {
        (Some(t), _) => Some(t.clone()),
        (None, Some(path)) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read text from {:?}", path))?,
        ),
        (None, None) => None,
    };

    let file = match &args.file {
        Some(input) => {
            let mut file = resolve_file(input, download_timeout)
                .await
                .with_context(|| format!("Failed to load {input}"))?;
            if let Some(ref mime) = args.mime {
                file.mime_type = mime.clone();
            }
            Some(file)
        }
        None => None,
    };

    let request = FlashcardRequest {
        text,
        file,
        count: args.count,
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let stats = if let Some(ref output_path) = args.output {
        let stats = generator
            .generate_to_file(request, output_path)
            .await
            .context("Generation failed")?;
        if !quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&output_path.display().to_string()));
        }
        stats
    } else {
        let output = generator
            .generate_with_stats(request)
            .await
            .context("Generation failed")?;
        let json =
            serde_json::to_string_pretty(&output.batch).context("Failed to serialise cards")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
        output.stats
    };

    if args.stats && !quiet {
        print_stats(&stats);
    }

    Ok(())
}

fn print_stats(stats: &GenerationStats) {
    eprintln!(
        "   {} chars{}  /  {} tokens in  /  {} tokens out",
        dim(&stats.content_chars.to_string()),
        if stats.truncated { " (truncated)" } else { "" },
        dim(&stats.prompt_tokens.to_string()),
        dim(&stats.completion_tokens.to_string()),
    );
    eprintln!(
        "   extract {}ms  /  model {}ms  /  total {}ms",
        stats.extraction_ms, stats.llm_ms, stats.total_ms
    );
}

#[cfg(feature = "server")]
async fn run_serve(args: ServeArgs) -> Result<()> {
    use flashgen::server::{serve, AppState};

    let max_upload = args.max_upload_bytes;
    let config = build_config(&args.model, None, |b| b.max_upload_bytes(max_upload)).await?;
    let generator = FlashcardGenerator::new(config).context("Failed to set up the generator")?;

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    eprintln!(
        "{} Server running at http://{}",
        green("◆"),
        bold(&listener.local_addr().context("No local address")?.to_string())
    );

    let state = AppState::new(generator).with_allowed_origin(args.allowed_origin);
    serve(listener, state).await.context("Server error")?;
    Ok(())
}

/// Map CLI args to `GeneratorConfig`.
async fn build_config(
    args: &ModelArgs,
    progress: Option<ProgressCallback>,
    extra: impl FnOnce(flashgen::GeneratorConfigBuilder) -> flashgen::GeneratorConfigBuilder,
) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_chars(args.max_chars)
        .ocr_language(args.ocr_language.clone())
        .tesseract_command(args.tesseract.clone())
        .api_timeout_secs(args.api_timeout)
        .max_card_count(args.max_cards);

    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref path) = args.pdfium_path {
        builder = builder.pdfium_library_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    extra(builder).build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_flags_parse() {
        let cli = Cli::try_parse_from([
            "flashgen", "generate", "--text", "cells", "-n", "3", "-o", "out.json", "--stats",
        ])
        .unwrap();
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.text.as_deref(), Some("cells"));
                assert_eq!(args.count, Some(3));
                assert!(args.stats);
                assert_eq!(args.model.ocr_language, "eng");
            }
            #[cfg(feature = "server")]
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn text_and_text_file_conflict() {
        let res = Cli::try_parse_from([
            "flashgen", "generate", "--text", "a", "--text-file", "notes.md",
        ]);
        assert!(res.is_err());
    }
}
