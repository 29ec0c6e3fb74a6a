//! Model backend trait and related types

use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Hosted model that reads a document and answers a prompt
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Backend identifier used in logs
    fn name(&self) -> &str;

    /// Whether credentials are present; checked by the readiness probe
    fn is_configured(&self) -> bool {
        true
    }

    /// Send one document plus prompt and return the raw reply text
    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelReply, BackendError>;
}

/// One model call
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    /// Raw document bytes
    pub document: &'a [u8],

    /// MIME type of `document`
    pub mime_type: &'a str,

    /// Rendered prompt text
    pub prompt: &'a str,

    /// Model identifier, e.g. `gemini-1.5-flash`
    pub model: &'a str,

    pub temperature: f32,
    pub max_tokens: u32,
}

/// Raw model reply
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    /// Concatenated text parts of the first candidate
    pub text: String,

    /// Model that answered, as reported upstream when available
    pub model: String,

    pub usage: Option<TokenUsage>,
}

/// Token accounting reported by the model API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_token_count: u32,
    pub candidates_token_count: u32,
    pub total_token_count: u32,

    /// Estimated cost in USD from published per-token prices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
}
