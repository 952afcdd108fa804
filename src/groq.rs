use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum GroqError {
    #[error("Missing GROQ_API_KEY")] MissingApiKey,
    #[error("{0}")] RequestFailed(String),
    #[error("HTTP error: {0}")] Http(String),
    #[error("Decode error: {0}")] Decode(String),
}

const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 2048;

// Keeps prompts and replies readable in the logs.
pub fn preview(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        text.to_string()
    } else {
        format!("{}...[{} chars]", text.chars().take(max).collect::<String>(), count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }
}

/// Prepends the system prompt, when there is one, and keeps the rest in order.
pub fn with_system_prompt(messages: Vec<ChatMessage>, system_prompt: Option<&str>) -> Vec<ChatMessage> {
    match system_prompt {
        Some(prompt) => std::iter::once(ChatMessage::system(prompt)).chain(messages).collect(),
        None => messages,
    }
}

pub fn image_data_uri(image: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, base64::engine::general_purpose::STANDARD.encode(image))
}

/// A single user message carrying the instruction and the image.
pub fn vision_messages(image: &[u8], mime_type: &str, prompt: &str, system_prompt: Option<&str>) -> Vec<ChatMessage> {
    let user = ChatMessage {
        role: Role::User,
        content: MessageContent::Parts(vec![
            ContentPart::Text { text: prompt.to_string() },
            ContentPart::ImageUrl { image_url: ImageUrl { url: image_data_uri(image, mime_type) } },
        ]),
    };
    with_system_prompt(vec![user], system_prompt)
}

pub fn chat_request_body(model: &str, messages: &[ChatMessage]) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "temperature": TEMPERATURE,
        "max_tokens": MAX_TOKENS,
    })
}

/// The three model capabilities the endpoints rely on.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn transcribe(&self, audio: Bytes, mime_type: &str) -> Result<String, GroqError>;

    async fn chat(&self, messages: Vec<ChatMessage>, system_prompt: Option<&str>) -> Result<String, GroqError>;

    async fn vision_chat(
        &self,
        image: Bytes,
        mime_type: &str,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, GroqError>;
}

pub struct GroqClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    chat_model: String,
    vision_model: String,
    transcription_model: String,
}

impl GroqClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
            chat_model: config.chat_model.clone(),
            vision_model: config.vision_model.clone(),
            transcription_model: config.transcription_model.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, GroqError> {
        self.api_key.as_deref().ok_or(GroqError::MissingApiKey)
    }

    async fn perform_chat_call(&self, model: &str, messages: &[ChatMessage], label: &str) -> Result<String, GroqError> {
        let key = self.api_key()?;
        let url = format!("{}/chat/completions", self.base_url);
        info!("🔗 {} to {} with model {} ({} messages)", label, url, model, messages.len());

        let response = self.client
            .post(&url)
            .bearer_auth(key)
            .json(&chat_request_body(model, messages))
            .send()
            .await
            .map_err(|e| GroqError::Http(e.to_string()))?;

        let fallback = format!("{label} failed");
        let parsed: ChatCompletionResponse = read_success(response, label, &fallback).await?;
        let content = parsed.first_content();
        info!("📥 {} reply: {}", label, preview(&content, 200));
        Ok(content)
    }
}

#[async_trait]
impl LlmProvider for GroqClient {
    async fn transcribe(&self, audio: Bytes, mime_type: &str) -> Result<String, GroqError> {
        let key = self.api_key()?;
        let url = format!("{}/audio/transcriptions", self.base_url);
        info!("🎙️ Transcribing {} bytes of {} audio", audio.len(), mime_type);

        let file = multipart::Part::bytes(audio.to_vec())
            .file_name("audio.webm")
            .mime_str(mime_type)
            .map_err(|e| GroqError::Http(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("model", self.transcription_model.clone())
            .text("language", "en");

        let response = self.client
            .post(&url)
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GroqError::Http(e.to_string()))?;

        let parsed: TranscriptionResponse = read_success(response, "Groq transcription", "Transcription failed").await?;
        let text = parsed.text.unwrap_or_default();
        info!("📝 Transcript: {}", preview(&text, 200));
        Ok(text)
    }

    async fn chat(&self, messages: Vec<ChatMessage>, system_prompt: Option<&str>) -> Result<String, GroqError> {
        let messages = with_system_prompt(messages, system_prompt);
        self.perform_chat_call(&self.chat_model, &messages, "Groq request").await
    }

    async fn vision_chat(
        &self,
        image: Bytes,
        mime_type: &str,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, GroqError> {
        // checked before encoding so a missing key costs nothing
        self.api_key()?;
        info!("🖼️ Vision request with {} bytes of {}", image.len(), mime_type);
        let messages = vision_messages(&image, mime_type, prompt, system_prompt);
        self.perform_chat_call(&self.vision_model, &messages, "Groq vision request").await
    }
}

/// Turns a non-2xx reply into `RequestFailed` carrying the body text, otherwise
/// decodes the JSON body.
async fn read_success<T: DeserializeOwned>(response: Response, label: &str, fallback: &str) -> Result<T, GroqError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!("❌ {} error: status={} body={}", label, status, body);
        let message = if body.trim().is_empty() { fallback.to_string() } else { body };
        return Err(GroqError::RequestFailed(message));
    }
    response.json::<T>().await.map_err(|e| GroqError::Decode(e.to_string()))
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice { #[serde(default)] message: Option<AssistantMessage> }

#[derive(Debug, Deserialize)]
struct AssistantMessage { #[serde(default)] content: Option<String> }

impl ChatCompletionResponse {
    fn first_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default()
    }
}
