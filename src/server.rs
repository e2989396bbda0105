//! HTTP service exposing the generator over axum.
//!
//! Routes:
//!
//! | Method | Path                        | Body                                   |
//! |--------|-----------------------------|----------------------------------------|
//! | GET    | `/`                         |                                        |
//! | GET    | `/health`                   |                                        |
//! | GET    | `/test`                     |                                        |
//! | POST   | `/api/generate-flashcards`  | multipart: `text`, `count`, `file`     |
//! | POST   | `/api/flashcards`           | JSON: `text`, `count`, `file` (base64) |
//!
//! Both POST routes answer `200` with the batch as a bare JSON array, or an
//! error status with `{"error": "..."}`.

use crate::error::FlashcardError;
use crate::generate::FlashcardGenerator;
use crate::output::{FlashcardBatch, FlashcardRequest, UploadedFile};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Room for multipart boundaries and the text field on top of the file limit.
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Shared state for all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub generator: FlashcardGenerator,
    /// Origin allowed to call the API from a browser, if any.
    pub allowed_origin: Option<String>,
}

impl AppState {
    pub fn new(generator: FlashcardGenerator) -> Self {
        Self {
            generator,
            allowed_origin: None,
        }
    }

    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = Some(origin.into());
        self
    }
}

/// Creates the Axum router with all the application routes.
pub fn create_router(state: AppState) -> Router {
    let (multipart_limit, json_limit) = body_limits(state.generator.config().max_upload_bytes);
    let cors = cors_layer(state.allowed_origin.as_deref());

    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/test", get(test_handler))
        .route(
            "/api/generate-flashcards",
            post(generate_multipart_handler).layer(DefaultBodyLimit::max(multipart_limit)),
        )
        .route(
            "/api/flashcards",
            post(generate_json_handler).layer(DefaultBodyLimit::max(json_limit)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Transport limits for the multipart and JSON routes.
fn body_limits(max_upload: usize) -> (usize, usize) {
    let multipart = max_upload.saturating_add(BODY_OVERHEAD_BYTES);
    // base64 grows the payload by a third.
    let json = max_upload
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(BODY_OVERHEAD_BYTES);
    (multipart, json)
}

fn cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin?;
    match HeaderValue::from_str(origin) {
        Ok(value) => Some(
            CorsLayer::new()
                .allow_origin(value)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        ),
        Err(_) => {
            warn!("Ignoring invalid CORS origin '{}'", origin);
            None
        }
    }
}

/// Serve the router on an already-bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, create_router(state)).await
}

// ── Error mapping ────────────────────────────────────────────────────────

/// Wraps [`FlashcardError`] for conversion into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub FlashcardError);

impl From<FlashcardError> for ApiError {
    fn from(err: FlashcardError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    /// The single mapping from library errors to HTTP status codes.
    /// Anything not caused by the request itself is a `500`.
    pub fn status(&self) -> StatusCode {
        match self.0 {
            FlashcardError::EmptyContent
            | FlashcardError::InvalidCardCount { .. }
            | FlashcardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            FlashcardError::FileTooLarge { .. } | FlashcardError::BodyTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            FlashcardError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            FlashcardError::ExtractionFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            FlashcardError::GenerationFailure { .. }
            | FlashcardError::MalformedModelResponse { .. }
            | FlashcardError::NoFlashcardsGenerated => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} ({}): {}", status, self.0.code(), self.0);
        } else {
            warn!("{} ({}): {}", status, self.0.code(), self.0);
        }

        let body = Json(json!({
            "error": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn root() -> &'static str {
    "flashgen: POST /api/generate-flashcards to turn notes into flashcards"
}

async fn health_check() -> &'static str {
    "OK"
}

async fn test_handler() -> Json<Value> {
    Json(json!({ "message": "Server is working!" }))
}

/// Lenient count parsing: anything unparseable means "use the default".
fn parse_count(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn count_from_json(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_count(s),
        _ => None,
    }
}

async fn generate_multipart_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<FlashcardBatch>, ApiError> {
    let mut request = FlashcardRequest::default();
    let limit = state.generator.config().max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "text" => {
                request.text = Some(field.text().await.map_err(|e| multipart_error(e, limit))?);
            }
            "count" => {
                let raw = field.text().await.map_err(|e| multipart_error(e, limit))?;
                request.count = parse_count(&raw);
            }
            "file" => {
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                if bytes.is_empty() {
                    continue;
                }
                let mut file = UploadedFile::new(bytes.to_vec(), mime_type);
                file.file_name = file_name;
                info!(
                    "Received upload {} ({}, {} bytes)",
                    file.display_name(),
                    file.mime_type,
                    file.bytes.len()
                );
                request.file = Some(file);
            }
            _ => warn!("Ignoring unknown multipart field: {}", name),
        }
    }

    let batch = state.generator.generate_flashcards(request).await?;
    Ok(Json(batch))
}

fn multipart_error(err: axum::extract::multipart::MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError(FlashcardError::BodyTooLarge { limit })
    } else {
        ApiError(FlashcardError::InvalidRequest(err.body_text()))
    }
}

/// JSON upload: file bytes travel base64-encoded.
#[derive(Debug, Deserialize)]
struct JsonFile {
    data: String,
    mime_type: String,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    file: Option<JsonFile>,
    #[serde(default)]
    count: Option<Value>,
}

async fn generate_json_handler(
    State(state): State<AppState>,
    payload: Result<Json<JsonRequest>, JsonRejection>,
) -> Result<Json<FlashcardBatch>, ApiError> {
    let Json(body) = payload.map_err(|e| FlashcardError::InvalidRequest(e.body_text()))?;

    let file = match body.file {
        Some(f) => {
            let bytes = general_purpose::STANDARD.decode(f.data.trim()).map_err(|e| {
                FlashcardError::InvalidRequest(format!("file.data is not valid base64: {e}"))
            })?;
            let mut file = UploadedFile::new(bytes, f.mime_type);
            file.file_name = f.file_name;
            Some(file)
        }
        None => None,
    };

    let request = FlashcardRequest {
        text: body.text,
        file,
        count: count_from_json(body.count.as_ref()),
    };

    let batch = state.generator.generate_flashcards(request).await?;
    Ok(Json(batch))
}
