//! Mock collaborators shared by the integration tests.
//!
//! Each mock counts its calls so tests can assert that a stage was (or was
//! not) reached, and the completion mock records every request it receives.

// Not every helper is used by every test file.
#![allow(dead_code)]

use async_trait::async_trait;
use flashgen::{
    CollaboratorResult, Collaborators, CompletionProvider, CompletionRequest, CompletionResponse,
    FlashcardGenerator, GeneratorConfig, OcrEngine, PdfTextExtractor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct MockPdf {
    pub text: Result<String, String>,
    pub calls: AtomicUsize,
}

impl MockPdf {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PdfTextExtractor for MockPdf {
    async fn extract(&self, _bytes: &[u8]) -> CollaboratorResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone().map_err(Into::into)
    }
}

pub struct MockOcr {
    pub text: String,
    pub languages: Mutex<Vec<String>>,
}

impl MockOcr {
    pub fn returning(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            languages: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.languages.lock().unwrap().len()
    }
}

#[async_trait]
impl OcrEngine for MockOcr {
    async fn recognize(&self, _image: &[u8], language: &str) -> CollaboratorResult<String> {
        self.languages.lock().unwrap().push(language.to_string());
        Ok(self.text.clone())
    }
}

/// Answers every prompt with the same body.
pub struct MockModel {
    pub reply: String,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_user_prompt(&self) -> String {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.user.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for MockModel {
    async fn complete(&self, request: &CompletionRequest) -> CollaboratorResult<CompletionResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(CompletionResponse {
            content: self.reply.clone(),
            prompt_tokens: 120,
            completion_tokens: 40,
        })
    }
}

pub const TWO_CARDS: &str = r#"{"cards":[
    {"front":"What does photosynthesis convert?","back":"Light energy into chemical energy"},
    {"front":"Where does photosynthesis happen?","back":"In the chloroplasts"}
]}"#;

pub struct Harness {
    pub pdf: Arc<MockPdf>,
    pub ocr: Arc<MockOcr>,
    pub model: Arc<MockModel>,
    pub generator: FlashcardGenerator,
}

impl Harness {
    pub fn new(config: GeneratorConfig, reply: &str) -> Self {
        Self::with_mocks(
            config,
            MockPdf::returning("Cells are the basic unit of life."),
            MockOcr::returning("Mitochondria\nproduce\n\nATP"),
            MockModel::replying(reply),
        )
    }

    pub fn with_mocks(
        config: GeneratorConfig,
        pdf: Arc<MockPdf>,
        ocr: Arc<MockOcr>,
        model: Arc<MockModel>,
    ) -> Self {
        let generator = FlashcardGenerator::with_collaborators(
            config,
            Collaborators {
                pdf: pdf.clone(),
                ocr: ocr.clone(),
                completion: model.clone(),
            },
        );
        Self {
            pdf,
            ocr,
            model,
            generator,
        }
    }

    pub fn external_calls(&self) -> usize {
        self.pdf.calls() + self.ocr.calls() + self.model.calls()
    }
}
