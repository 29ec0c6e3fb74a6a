//! HTTP client for the Gemini `generateContent` API
//!
//! One request per extraction: the PDF travels inline as base64 followed by
//! the prompt text, and the model is asked for `application/json` output.

use crate::models::GeminiModel;
use async_trait::async_trait;
use base64::Engine;
use quote_extract_core::{
    BackendError, ExtractionBackend, ModelReply, ModelRequest, Settings, TokenUsage,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Upstream error bodies are cut to this many characters
const ERROR_PREVIEW_CHARS: usize = 300;

/// `generateContent` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    candidate_count: u32,
    response_mime_type: &'static str,
}

/// `generateContent` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    /// Create a client against the public API with a 120 s timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: Option<String>) -> Result<Self, BackendError> {
        Self::with_config(api_key, DEFAULT_API_BASE, Duration::from_secs(120))
    }

    /// Create a client with an explicit base URL and timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from service settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_settings(settings: &Settings) -> Result<Self, BackendError> {
        Self::with_config(
            settings.gemini_api_key.clone(),
            settings.gemini_api_base.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl ExtractionBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelReply, BackendError> {
        let api_key = self.api_key.as_deref().ok_or(BackendError::NotConfigured)?;

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: request.mime_type,
                            data: base64::engine::general_purpose::STANDARD
                                .encode(request.document),
                        },
                    },
                    RequestPart::Text {
                        text: request.prompt,
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                candidate_count: 1,
                response_mime_type: "application/json",
            },
        };

        debug!(
            "Calling {} with {} document bytes, {} prompt chars",
            request.model,
            request.document.len(),
            request.prompt.len()
        );

        let response = self
            .http_client
            .post(self.endpoint(request.model))
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Transport(format!("Request to Gemini timed out: {e}"))
                } else {
                    BackendError::Transport(format!("Failed to send request to Gemini: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = error_message(&error_text);
            warn!("Gemini API error ({}): {}", status, message);
            return Err(match status.as_u16() {
                429 => BackendError::RateLimited(message),
                401 | 403 => BackendError::Unauthorized(message),
                code => BackendError::Status {
                    status: code,
                    message,
                },
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                BackendError::InvalidResponse(format!("Failed to parse Gemini response: {e}"))
            })?;

        reply_from_response(parsed, request.model)
    }
}

fn reply_from_response(
    parsed: GenerateResponse,
    requested_model: &str,
) -> Result<ModelReply, BackendError> {
    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(BackendError::EmptyResponse(format!("prompt blocked: {reason}")));
    }

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::EmptyResponse("no candidates returned".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(BackendError::EmptyResponse(format!(
            "candidate has no text (finish reason {reason})"
        )));
    }

    let cost_model = requested_model.parse::<GeminiModel>().ok();
    let usage = parsed.usage_metadata.map(|u| TokenUsage {
        prompt_token_count: u.prompt_token_count,
        candidates_token_count: u.candidates_token_count,
        total_token_count: u.total_token_count,
        estimated_cost: cost_model
            .map(|m| m.estimate_cost(u.prompt_token_count, u.candidates_token_count)),
    });

    Ok(ModelReply {
        text,
        model: parsed
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
        usage,
    })
}

// Prefer the structured message; fall back to a prefix of the raw body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(status) => format!("{status}: {}", parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.chars().take(ERROR_PREVIEW_CHARS).collect(),
    }
}
