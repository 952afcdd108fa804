use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::{
    config::AppConfig,
    demo::{self, DEMO_CONFIDENCE},
    groq::{preview, ChatMessage, GroqError, LlmProvider},
    models::{ErrorBody, ExtractMode, ExtractTextRequest, ExtractionResult, GenerateRequest, GenerationResult, MealOption},
    normalize::{canonicalize_ingredients, merge_ingredients, parse_model_output, ModelExtraction, ModelGeneration},
};

const EXTRACTION_SYSTEM_PROMPT: &str = "You pull cooking ingredients out of whatever the user gives you. \
    Reply with JSON only, shaped exactly like { \"ingredients\": string[], \"confidence\": number, \"question\": string | null }. \
    confidence runs from 0 to 1. When confidence is below 0.6, ask ONE short clarifying question in a relaxed Australian tone; \
    at 0.6 or above, question must be null. Do not add other keys. \
    Keep quantities and states the user mentions (e.g. 'leftover schnitzel', 'half a pumpkin', '2 cans of tuna').";

const VISION_INSTRUCTION: &str = "Extract the visible ingredients and pantry items from this image. Ignore utensils.";

const GENERATION_SYSTEM_PROMPT: &str = "You are a practical Australian home cook. Suggest up to three meal ideas \
    using the listed ingredients and the cook's energy level. Keep them realistic and low-fuss, no fancy ingredients. \
    Reply with JSON only: { \"meals\": [{ \"name\": string, \"why\": string, \"steps\": string[], \"substitutions\": string[] }] }. \
    Keep steps short. Lower energy means fewer ideas and fewer steps; higher energy can mean more of both.";

pub const EMPTY_TRANSCRIPT_QUESTION: &str = "Didn't catch that - mind saying it again?";

const DEFAULT_AUDIO_MIME: &str = "audio/webm";
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub llm: Arc<dyn LlmProvider>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")] BadRequest(String),
    #[error("Invalid request body: {0}")] InvalidBody(String),
    #[error(transparent)] Upstream(#[from] GroqError),
    #[error("Malformed model output: {0}")] MalformedOutput(#[from] serde_json::Error),
    #[error(transparent)] Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/api/extract", post(extract_ingredients))
        .route("/api/generate", post(generate_meals))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

// Missing uploads go back as 400 without touching the server log.
fn log_server_error(context: &str, err: &ApiError) {
    if err.status().is_server_error() {
        error!("❌ {} error: {}", context, err);
    }
}

pub async fn extract_ingredients(State(state): State<AppState>, request: Request) -> Result<Json<ExtractionResult>, ApiError> {
    extract(&state, request)
        .await
        .inspect_err(|e| log_server_error("Extract", e))
        .map(Json)
}

pub async fn generate_meals(
    State(state): State<AppState>,
    payload: Result<Bytes, BytesRejection>,
) -> Result<Json<GenerationResult>, ApiError> {
    generate_from_payload(&state, payload)
        .await
        .inspect_err(|e| log_server_error("Generate", e))
        .map(|meals| Json(GenerationResult { meals }))
}

async fn generate_from_payload(
    state: &AppState,
    payload: Result<Bytes, BytesRejection>,
) -> Result<Vec<MealOption>, ApiError> {
    let bytes = payload.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let body: GenerateRequest = decode_body(&bytes)?;
    generate(state, &body).await
}

/// Reads JSON whatever the declared content type. Going through `Value` lets the
/// lenient fields recover from wrong types.
fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    let raw: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ApiError::InvalidBody(e.to_string()))?;
    serde_json::from_value(raw).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("multipart/form-data"))
}

async fn extract(state: &AppState, request: Request) -> Result<ExtractionResult, ApiError> {
    if state.config.demo_mode {
        info!("🎭 Demo mode: returning canned ingredients");
        tokio::time::sleep(state.config.extract_demo_delay).await;
        return Ok(ExtractionResult {
            ingredients: demo::demo_ingredients()?,
            confidence: DEMO_CONFIDENCE,
            question: None,
        });
    }

    if is_multipart(&request) {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::InvalidBody(e.body_text()))?;
        let upload = read_upload(multipart).await?;
        if let Some(audio) = upload.audio {
            return extract_from_audio(state, audio).await;
        }
        if let Some(image) = upload.first_image {
            return extract_from_image(state, image).await;
        }
        return Err(ApiError::BadRequest("No audio or images provided".to_string()));
    }

    let bytes = Bytes::from_request(request, state)
        .await
        .map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    let body: ExtractTextRequest = decode_body(&bytes)?;
    extract_from_text(state, body).await
}

struct UploadedFile {
    bytes: Bytes,
    content_type: Option<String>,
}

#[derive(Default)]
struct ExtractUpload {
    audio: Option<UploadedFile>,
    first_image: Option<UploadedFile>,
}

/// Keeps the `audio` file and the first of the `images` files; other parts are skipped.
async fn read_upload(mut multipart: Multipart) -> Result<ExtractUpload, ApiError> {
    let mut upload = ExtractUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidBody(format!("Failed to read multipart field: {}", e)))?
    {
        if field.file_name().is_none() {
            continue;
        }
        let name = field.name().unwrap_or("").to_string();
        let content_type = field.content_type().map(str::to_string).filter(|ct| !ct.is_empty());

        let slot = match name.as_str() {
            "audio" if upload.audio.is_none() => &mut upload.audio,
            "images" if upload.first_image.is_none() => &mut upload.first_image,
            _ => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidBody(format!("Failed to read {}: {}", name, e)))?;
        *slot = Some(UploadedFile { bytes, content_type });
    }

    Ok(upload)
}

fn extraction_result(parsed: ModelExtraction) -> ExtractionResult {
    let confidence = parsed.confidence();
    ExtractionResult {
        ingredients: canonicalize_ingredients(&parsed.ingredients),
        confidence,
        question: parsed.question,
    }
}

fn extraction_message(text: &str) -> String {
    format!("Extract ingredients from: \"{}\"", text)
}

async fn extract_from_audio(state: &AppState, audio: UploadedFile) -> Result<ExtractionResult, ApiError> {
    let mime_type = audio.content_type.as_deref().unwrap_or(DEFAULT_AUDIO_MIME);
    let transcript = state.llm.transcribe(audio.bytes, mime_type).await?;

    if transcript.trim().is_empty() {
        info!("🤷 Empty transcript, asking the user to repeat");
        return Ok(ExtractionResult {
            ingredients: Vec::new(),
            confidence: 0.0,
            question: Some(EMPTY_TRANSCRIPT_QUESTION.to_string()),
        });
    }

    let reply = state
        .llm
        .chat(vec![ChatMessage::user(extraction_message(&transcript))], Some(EXTRACTION_SYSTEM_PROMPT))
        .await?;
    let result = extraction_result(parse_model_output(&reply)?);
    info!("✅ Extracted {} ingredients from audio", result.ingredients.len());
    Ok(result)
}

async fn extract_from_image(state: &AppState, image: UploadedFile) -> Result<ExtractionResult, ApiError> {
    let mime_type = image.content_type.as_deref().unwrap_or(DEFAULT_IMAGE_MIME);
    let reply = state
        .llm
        .vision_chat(image.bytes, mime_type, VISION_INSTRUCTION, Some(EXTRACTION_SYSTEM_PROMPT))
        .await?;
    let result = extraction_result(parse_model_output(&reply)?);
    info!("✅ Extracted {} ingredients from photo", result.ingredients.len());
    Ok(result)
}

async fn extract_from_text(state: &AppState, body: ExtractTextRequest) -> Result<ExtractionResult, ApiError> {
    let clarify = body.mode == ExtractMode::Clarify;
    let mut message = format!("{}.", extraction_message(&body.text));
    if clarify {
        message.push_str(&format!(" Prior ingredients: {}", body.prior_ingredients.join(", ")));
    }
    info!("🎯 Text extraction ({:?}): {}", body.mode, preview(&message, 120));

    let reply = state
        .llm
        .chat(vec![ChatMessage::user(message)], Some(EXTRACTION_SYSTEM_PROMPT))
        .await?;
    let mut result = extraction_result(parse_model_output(&reply)?);
    if clarify {
        result.ingredients = merge_ingredients(&body.prior_ingredients, &result.ingredients);
    }
    info!("✅ Extracted {} ingredients from text", result.ingredients.len());
    Ok(result)
}

async fn generate(state: &AppState, body: &GenerateRequest) -> Result<Vec<MealOption>, ApiError> {
    let energy = body.energy_label();

    if state.config.demo_mode {
        info!("🎭 Demo mode: returning static meals for energy '{}'", energy);
        tokio::time::sleep(state.config.generate_demo_delay).await;
        return Ok(demo::demo_meals(energy)?);
    }

    let message = format!("Ingredients: {}. Energy level: {}.", body.ingredients.join(", "), energy);
    info!("🍳 Generating meals: {}", preview(&message, 160));

    let reply = state
        .llm
        .chat(vec![ChatMessage::user(message)], Some(GENERATION_SYSTEM_PROMPT))
        .await?;
    let parsed: ModelGeneration = parse_model_output(&reply)?;
    info!("✅ Generated {} meal ideas", parsed.meals.len());
    Ok(parsed.meals)
}
