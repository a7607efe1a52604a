//! Generation client for the Gemini `generateContent` API.
//!
//! Provides a `GenerationClient` trait so the agent runner can be driven by a
//! fake in tests, plus the real reqwest-backed [`GeminiClient`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::GeminiConfig;

/// Keys at or below this length are treated as placeholders.
const MIN_API_KEY_LEN: usize = 21;

const API_KEY_HEADER: &str = "x-goog-api-key";

// ============================================================================
// GenerationClient trait
// ============================================================================

/// Abstraction over text generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate raw text for a prompt.
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationClientError>;

    /// Model name for logging.
    fn model(&self) -> &str;
}

// ============================================================================
// Prompt
// ============================================================================

/// An instruction for the model plus sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub image: Option<InlineImage>,
}

impl Prompt {
    pub fn new(text: impl Into<String>, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            text: text.into(),
            temperature,
            max_output_tokens,
            image: None,
        }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Base64 image data sent alongside the prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// Accepts raw base64 or a `data:image/png;base64,...` URL.
    /// Raw base64 is assumed to be JPEG.
    pub fn from_upload(image_data: &str) -> Self {
        let image_data = image_data.trim();
        if let Some(rest) = image_data.strip_prefix("data:") {
            if let Some((header, data)) = rest.split_once(',') {
                let mime_type = header
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty())
                    .unwrap_or("image/jpeg");
                return Self {
                    mime_type: mime_type.to_string(),
                    data: data.to_string(),
                };
            }
        }

        Self {
            mime_type: "image/jpeg".to_string(),
            data: image_data.to_string(),
        }
    }
}

// ============================================================================
// API key
// ============================================================================

/// A Gemini API key that passed the startup sanity check.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for absent, blank, placeholder-length or whitespace-bearing keys.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        if raw.len() < MIN_API_KEY_LEN || raw.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First eight characters followed by an ellipsis, for startup logs.
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(8).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.masked())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum GenerationClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no text")]
    EmptyResponse,

    #[error("Generation blocked: {0}")]
    Blocked(String),
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiClient
// ============================================================================

/// Gemini text/vision client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: ApiKey, config: &GeminiConfig) -> Result<Self, GenerationClientError> {
        Self::with_base_url(api_key, config, config.base_url.clone())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        api_key: ApiKey,
        config: &GeminiConfig,
        base_url: String,
    ) -> Result<Self, GenerationClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url,
        })
    }

    /// Build a client only when the configured key passes [`ApiKey::parse`].
    pub fn from_config(config: &GeminiConfig) -> Option<Self> {
        let raw = config.api_key_from_env();
        let key = ApiKey::parse(raw.as_deref())?;
        match Self::new(key, config) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::error!(error = %e, "Failed to build Gemini HTTP client");
                None
            }
        }
    }

    fn request_body(prompt: &Prompt) -> GenerateRequest {
        let mut parts = vec![Part::Text {
            text: prompt.text.clone(),
        }];
        if let Some(image) = &prompt.image {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }

        GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: prompt.temperature,
                max_output_tokens: prompt.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationClientError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        // Key stays out of the URL; reqwest errors echo the URL.
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&Self::request_body(prompt))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(GenerationClientError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(GenerationClientError::Blocked(reason));
            }
            return Err(GenerationClientError::EmptyResponse);
        }

        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// TESTS
// ============================================================================
