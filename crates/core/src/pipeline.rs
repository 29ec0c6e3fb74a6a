//! One extraction: render prompt, call the model, parse, normalize

use crate::backend::{ExtractionBackend, ModelRequest, TokenUsage};
use crate::catalog::FieldCatalog;
use crate::error::ExtractError;
use crate::normalize::{FieldValue, Normalizer};
use crate::prompt::PromptLibrary;
use crate::response::parse_model_json;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Bounds accepted for request overrides
pub const MAX_TOKENS_LIMIT: u32 = 8192;

/// Per-request extraction parameters
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Raw PDF bytes
    pub document: Vec<u8>,

    /// Upload name, used in logs
    pub filename: String,

    /// Model identifier
    pub model: String,

    /// Prompt version; `None` uses the library default
    pub prompt_version: Option<String>,

    pub temperature: f32,
    pub max_tokens: u32,

    pub include_confidence: bool,
    pub include_token_usage: bool,
}

impl ExtractionRequest {
    /// Check parameter ranges before any model call.
    ///
    /// # Errors
    /// Returns `InvalidRequest` naming the first offending parameter.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.document.is_empty() {
            return Err(ExtractError::InvalidRequest("Uploaded file is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ExtractError::InvalidRequest(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                self.temperature
            )));
        }
        if !(1..=MAX_TOKENS_LIMIT).contains(&self.max_tokens) {
            return Err(ExtractError::InvalidRequest(format!(
                "max_tokens must be between 1 and {MAX_TOKENS_LIMIT}, got {}",
                self.max_tokens
            )));
        }
        if self.model.trim().is_empty() {
            return Err(ExtractError::InvalidRequest("model must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Outcome of one extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub extracted_data: IndexMap<String, FieldValue>,
    pub confidence_scores: IndexMap<String, f64>,
    pub failed_fields: Vec<String>,
    pub warnings: Vec<String>,
    pub field_warnings: IndexMap<String, Vec<String>>,

    /// Wall-clock seconds spent, model call included
    pub processing_time: f64,

    pub model_used: String,
    pub prompt_version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl ExtractionResult {
    /// True when at least one required field was not found
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failed_fields.is_empty()
    }
}

/// Shared, stateless extraction service
#[derive(Clone)]
pub struct Extractor {
    catalog: Arc<FieldCatalog>,
    prompts: Arc<PromptLibrary>,
    backend: Arc<dyn ExtractionBackend>,
}

impl Extractor {
    pub fn new(
        catalog: Arc<FieldCatalog>,
        prompts: Arc<PromptLibrary>,
        backend: Arc<dyn ExtractionBackend>,
    ) -> Self {
        Self {
            catalog,
            prompts,
            backend,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    #[must_use]
    pub fn backend(&self) -> &dyn ExtractionBackend {
        self.backend.as_ref()
    }

    /// Run one extraction. A single model call is made; nothing is retried.
    ///
    /// # Errors
    /// Returns an error for invalid parameters, an unknown prompt version,
    /// a failed model call or a reply that holds no JSON object.
    pub async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResult, ExtractError> {
        let started = Instant::now();
        request.validate()?;

        let prompt = self
            .prompts
            .render(&self.catalog, request.prompt_version.as_deref())?;

        info!(
            "Extracting {} ({} bytes) with {} via {}, prompt {}",
            request.filename,
            request.document.len(),
            request.model,
            self.backend.name(),
            prompt.version
        );

        let reply = self
            .backend
            .generate(&ModelRequest {
                document: &request.document,
                mime_type: PDF_MIME_TYPE,
                prompt: &prompt.text,
                model: &request.model,
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            })
            .await?;

        debug!("Model reply: {} chars", reply.text.len());

        let raw = parse_model_json(&reply.text).inspect_err(|e| {
            warn!("Unparseable model reply for {}: {}", request.filename, e);
        })?;

        let normalized = Normalizer::new(&self.catalog)
            .with_confidence(request.include_confidence)
            .normalize(&raw, &reply.text);

        let processing_time = started.elapsed().as_secs_f64();
        info!(
            "Extracted {} of {} fields from {} in {:.2}s ({} failed)",
            normalized.extracted_data.len(),
            self.catalog.len(),
            request.filename,
            processing_time,
            normalized.failed_fields.len()
        );

        Ok(ExtractionResult {
            extracted_data: normalized.extracted_data,
            confidence_scores: normalized.confidence_scores,
            failed_fields: normalized.failed_fields,
            warnings: normalized.warnings,
            field_warnings: normalized.field_warnings,
            processing_time,
            model_used: if reply.model.is_empty() {
                request.model.clone()
            } else {
                reply.model
            },
            prompt_version: prompt.version,
            token_usage: if request.include_token_usage {
                reply.usage
            } else {
                None
            },
        })
    }
}
