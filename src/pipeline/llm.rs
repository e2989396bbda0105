//! Generation: build the flashcard prompt and call the completion provider.
//!
//! The pipeline talks to the model through [`CompletionProvider`], a narrow
//! trait with one method. [`LlmCompletion`] adapts any `edgequake_llm`
//! provider (OpenAI, Anthropic, Gemini, Ollama, …) to it; tests plug in
//! scripted doubles.
//!
//! One request, one response: no retry and no streaming. A timeout abandons
//! the call and surfaces as [`FlashcardError::GenerationFailure`].

use crate::config::GeneratorConfig;
use crate::error::{CollaboratorResult, FlashcardError};
use crate::output::GenerationRequest;
use crate::prompts::{flashcard_user_prompt, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Output shape requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Free text.
    #[default]
    Text,
    /// A single JSON object, for providers that can enforce it.
    JsonObject,
}

/// A fully built completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub format: ResponseFormat,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// The model's answer plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Sends one prompt to a language model.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> CollaboratorResult<CompletionResponse>;
}

/// [`CompletionProvider`] backed by an `edgequake_llm` chat provider.
#[derive(Clone)]
pub struct LlmCompletion {
    provider: Arc<dyn LLMProvider>,
}

impl LlmCompletion {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CompletionProvider for LlmCompletion {
    async fn complete(&self, request: &CompletionRequest) -> CollaboratorResult<CompletionResponse> {
        let messages = vec![
            ChatMessage::system(&request.system),
            ChatMessage::user(&request.user),
        ];
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| e.to_string())?;

        Ok(CompletionResponse {
            content: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

/// Map a request onto `CompletionOptions`.
fn build_options(request: &CompletionRequest) -> CompletionOptions {
    let response_format = match request.format {
        ResponseFormat::JsonObject => Some("json_object".to_string()),
        ResponseFormat::Text => None,
    };
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        response_format,
        ..Default::default()
    }
}

/// Build the completion call for a generation request.
pub fn build_request(request: &GenerationRequest, config: &GeneratorConfig) -> CompletionRequest {
    CompletionRequest {
        system: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        user: flashcard_user_prompt(&request.content, request.card_count),
        format: ResponseFormat::JsonObject,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Ask the model for `request.card_count` cards and return its raw answer.
pub async fn generate_raw(
    provider: &dyn CompletionProvider,
    request: &GenerationRequest,
    config: &GeneratorConfig,
) -> Result<CompletionResponse, FlashcardError> {
    let start = Instant::now();
    let completion = build_request(request, config);
    info!(
        "Requesting {} flashcards ({} characters of content)",
        request.card_count,
        request.content.chars().count()
    );

    let secs = config.api_timeout_secs;
    let response = match timeout(Duration::from_secs(secs), provider.complete(&completion)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            warn!("Completion call failed: {}", e);
            return Err(FlashcardError::GenerationFailure {
                message: e.to_string(),
            });
        }
        Err(_) => {
            warn!("Completion call timed out after {}s", secs);
            return Err(FlashcardError::GenerationFailure {
                message: format!("completion call timed out after {secs}s"),
            });
        }
    };

    debug!(
        "{} input tokens, {} output tokens, {:?}",
        response.prompt_tokens,
        response.completion_tokens,
        start.elapsed()
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        reply: CollaboratorResult<String>,
        seen: Mutex<Option<CompletionRequest>>,
    }

    impl Scripted {
        fn ok(body: &str) -> Self {
            Self {
                reply: Ok(body.to_string()),
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> CollaboratorResult<CompletionResponse> {
            *self.seen.lock().unwrap() = Some(request.clone());
            match &self.reply {
                Ok(body) => Ok(CompletionResponse::text(body.clone())),
                Err(e) => Err(e.to_string().into()),
            }
        }
    }

    struct Stalled;

    #[async_trait]
    impl CompletionProvider for Stalled {
        async fn complete(&self, _: &CompletionRequest) -> CollaboratorResult<CompletionResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CompletionResponse::default())
        }
    }

    fn request(count: i64) -> GenerationRequest {
        GenerationRequest {
            content: "Photosynthesis converts light to energy.".into(),
            card_count: count,
        }
    }

    #[test]
    fn options_request_json_mode() {
        let config = GeneratorConfig::default();
        let opts = build_options(&build_request(&request(2), &config));
        assert_eq!(opts.temperature, Some(0.7));
        assert_eq!(opts.max_tokens, Some(4096));
        assert_eq!(opts.response_format.as_deref(), Some("json_object"));
    }

    #[test]
    fn custom_system_prompt_overrides_default() {
        let config = GeneratorConfig::builder()
            .system_prompt("Write cards in French.")
            .build()
            .unwrap();
        let req = build_request(&request(3), &config);
        assert_eq!(req.system, "Write cards in French.");
        assert!(req.user.contains("exactly 3 flashcards"));
    }

    #[tokio::test]
    async fn raw_answer_is_passed_back() {
        let provider = Scripted::ok(r#"{"cards":[]}"#);
        let out = generate_raw(&provider, &request(2), &GeneratorConfig::default())
            .await
            .unwrap();
        assert_eq!(out.content, r#"{"cards":[]}"#);

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.format, ResponseFormat::JsonObject);
        assert!(seen.user.contains("Photosynthesis converts light to energy."));
    }

    #[tokio::test]
    async fn negative_count_is_passed_through() {
        let provider = Scripted::ok("[]");
        generate_raw(&provider, &request(-1), &GeneratorConfig::default())
            .await
            .unwrap();
        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert!(seen.user.contains("exactly -1 flashcards"));
    }

    #[tokio::test]
    async fn provider_error_is_a_generation_failure() {
        let provider = Scripted {
            reply: Err("insufficient_quota".into()),
            seen: Mutex::new(None),
        };
        let err = generate_raw(&provider, &request(2), &GeneratorConfig::default())
            .await
            .unwrap_err();
        assert!(
            matches!(err, FlashcardError::GenerationFailure { ref message } if message.contains("insufficient_quota"))
        );
    }

    #[tokio::test]
    async fn stalled_call_times_out() {
        let config = GeneratorConfig::builder().api_timeout_secs(1).build().unwrap();
        let err = generate_raw(&Stalled, &request(2), &config).await.unwrap_err();
        assert!(err.to_string().contains("timed out after 1s"), "got: {err}");
    }
}
