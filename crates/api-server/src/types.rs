//! API request and response types

use chrono::{DateTime, Utc};
use quote_extract_core::{ExtractionResult, FieldSpec, PromptInfo, PromptPreview};
use quote_extract_gemini::ModelInfo;
use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;

/// Error body shared by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable reason
    pub detail: String,
}

/// Outcome label of an extraction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractStatus {
    /// Every required field was found
    Success,
    /// Some required fields are listed in `failed_fields`
    PartialSuccess,
}

/// Extraction response
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResponse {
    pub status: ExtractStatus,
    /// Unique id, also used in server logs
    pub request_id: String,
    #[serde(flatten)]
    pub result: ExtractionResult,
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when credentials are missing
    pub status: String,
    /// Crate version
    pub version: String,
    pub environment: String,
    /// Whether the model API key is set
    pub model_configured: bool,
    pub default_model: String,
    pub available_models: Vec<String>,
    pub prompt_versions: Vec<String>,
    pub default_prompt_version: String,
    pub fields_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Liveness probe response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveResponse {
    pub status: String,
    pub uptime_seconds: u64,
}

/// Readiness probe response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// `ready` or `not ready`
    pub status: String,
    /// Reasons the service cannot take traffic
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

/// Effective limits, reported next to the counters
#[derive(Debug, Clone, Serialize)]
pub struct LimitsInfo {
    pub max_file_size_mb: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub request_timeout_secs: u64,
}

/// Metrics endpoint response
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub uptime_seconds: u64,
    pub counters: MetricsSnapshot,
    pub limits: LimitsInfo,
}

/// Supported models
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default_model: String,
}

/// Prompt versions
#[derive(Debug, Clone, Serialize)]
pub struct PromptsResponse {
    pub versions: Vec<PromptInfo>,
    pub default_version: String,
}

/// Query for a single prompt version
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptQuery {
    /// Include a rendered preview
    #[serde(default)]
    pub preview: bool,
    /// Preview length in characters (default 1000)
    pub max_length: Option<usize>,
}

/// One prompt version, optionally with a rendered preview
#[derive(Debug, Clone, Serialize)]
pub struct PromptDetailResponse {
    #[serde(flatten)]
    pub info: PromptInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PromptPreview>,
}

/// Field catalog
#[derive(Debug, Clone, Serialize)]
pub struct FieldsResponse {
    pub fields: Vec<FieldSpec>,
    pub total: usize,
    pub required: Vec<String>,
}
