//! HTTP request handlers for API endpoints

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use quote_extract_core::{ExtractionBackend, ExtractionRequest};
use quote_extract_gemini::GeminiModel;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::ClientKey,
    types::{
        ExtractResponse, ExtractStatus, FieldsResponse, HealthResponse, LimitsInfo, LiveResponse,
        MetricsResponse, ModelsResponse, PromptDetailResponse, PromptQuery, PromptsResponse,
        ReadyResponse,
    },
    ApiError, ApiState,
};

const PDF_MAGIC: &[u8] = b"%PDF-";
const DEFAULT_PREVIEW_CHARS: usize = 1000;

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let extractor = &state.extractor;
    let model_configured = extractor.backend().is_configured();
    let healthy = model_configured && state.settings.has_api_keys();

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.settings.environment.clone(),
        model_configured,
        default_model: state.settings.default_model.clone(),
        available_models: GeminiModel::ALL
            .iter()
            .map(|m| m.model_id().to_string())
            .collect(),
        prompt_versions: extractor.prompts().available_versions(),
        default_prompt_version: extractor.prompts().default_version().to_string(),
        fields_count: extractor.catalog().len(),
        timestamp: Utc::now(),
    })
}

/// Liveness probe: the process is up
pub async fn liveness(State(state): State<ApiState>) -> impl IntoResponse {
    Json(LiveResponse {
        status: "alive".to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Readiness probe: credentials are present so requests can succeed
pub async fn readiness(State(state): State<ApiState>) -> impl IntoResponse {
    let mut reasons = Vec::new();
    if !state.extractor.backend().is_configured() {
        reasons.push("Gemini API key not configured".to_string());
    }
    if !state.settings.has_api_keys() {
        reasons.push("No API keys configured".to_string());
    }

    if reasons.is_empty() {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready".to_string(),
                reasons,
            }),
        )
    } else {
        warn!("Readiness check failed: {}", reasons.join("; "));
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "not ready".to_string(),
                reasons,
            }),
        )
    }
}

/// Request counters and effective limits
pub async fn metrics_report(State(state): State<ApiState>) -> impl IntoResponse {
    let settings = &state.settings;
    Json(MetricsResponse {
        uptime_seconds: state.uptime_seconds(),
        counters: state.metrics.snapshot(),
        limits: LimitsInfo {
            max_file_size_mb: settings.max_file_size_mb,
            rate_limit_requests: settings.rate_limit_requests,
            rate_limit_window_secs: settings.rate_limit_window_secs,
            request_timeout_secs: settings.request_timeout_secs,
        },
    })
}

/// Supported models
pub async fn list_models(State(state): State<ApiState>) -> impl IntoResponse {
    Json(ModelsResponse {
        models: GeminiModel::ALL.iter().map(GeminiModel::info).collect(),
        default_model: state.settings.default_model.clone(),
    })
}

/// Prompt versions
pub async fn list_prompts(State(state): State<ApiState>) -> impl IntoResponse {
    let prompts = state.extractor.prompts();
    Json(PromptsResponse {
        versions: prompts.infos(state.extractor.catalog()),
        default_version: prompts.default_version().to_string(),
    })
}

/// One prompt version, with `?preview=true` for the rendered text
pub async fn get_prompt(
    State(state): State<ApiState>,
    Path(version): Path<String>,
    Query(query): Query<PromptQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let prompts = state.extractor.prompts();
    let catalog = state.extractor.catalog();

    let info = prompts
        .info(catalog, &version)
        .map_err(|_| ApiError::NotFound(format!("Prompt version {version} not found")))?;

    let preview = if query.preview {
        let max_chars = query.max_length.unwrap_or(DEFAULT_PREVIEW_CHARS);
        Some(
            prompts
                .preview(catalog, &version, max_chars)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        )
    } else {
        None
    };

    Ok(Json(PromptDetailResponse { info, preview }))
}

/// Field catalog
pub async fn list_fields(State(state): State<ApiState>) -> impl IntoResponse {
    let catalog = state.extractor.catalog();
    Json(FieldsResponse {
        fields: catalog.fields().to_vec(),
        total: catalog.len(),
        required: catalog.required_fields().map(|f| f.name.clone()).collect(),
    })
}

/// Uploaded form, before validation
#[derive(Debug, Default)]
struct ExtractForm {
    file: Option<Vec<u8>>,
    filename: Option<String>,
    content_type: Option<String>,
    model: Option<String>,
    prompt_version: Option<String>,
    temperature: Option<String>,
    max_tokens: Option<String>,
    include_confidence: Option<String>,
    include_token_usage: Option<String>,
}

// Reads the whole form; the file is dropped as soon as it exceeds the limit
async fn read_form(
    mut multipart: Multipart,
    max_bytes: u64,
    max_mb: u64,
) -> Result<ExtractForm, ApiError> {
    let mut form = ExtractForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_multipart(&e, max_mb))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            form.filename = field.file_name().map(String::from);
            form.content_type = field.content_type().map(String::from);

            let mut data = Vec::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| ApiError::from_multipart(&e, max_mb))?
            {
                if (data.len() + chunk.len()) as u64 > max_bytes {
                    return Err(ApiError::FileTooLarge { max_mb });
                }
                data.extend_from_slice(&chunk);
            }
            form.file = Some(data);
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::from_multipart(&e, max_mb))?;
        let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        match name.as_str() {
            "model" => form.model = value,
            "prompt_version" => form.prompt_version = value,
            "temperature" => form.temperature = value,
            "max_tokens" => form.max_tokens = value,
            "include_confidence" => form.include_confidence = value,
            "include_token_usage" => form.include_token_usage = value,
            other => warn!("Ignoring unknown form field {}", other),
        }
    }

    Ok(form)
}

fn parse_bool(name: &str, value: Option<&str>) -> Result<bool, ApiError> {
    match value.map(str::to_lowercase).as_deref() {
        None => Ok(false),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(ApiError::BadRequest(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}

fn is_pdf_upload(filename: Option<&str>, content_type: Option<&str>) -> bool {
    let named_pdf = filename.is_some_and(|n| n.to_lowercase().ends_with(".pdf"));
    let typed_pdf = content_type.is_some_and(|c| {
        c.split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/pdf"))
    });
    named_pdf || typed_pdf
}

fn build_request(state: &ApiState, form: ExtractForm) -> Result<ExtractionRequest, ApiError> {
    let settings = &state.settings;

    let Some(document) = form.file else {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    };
    if document.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    if !is_pdf_upload(form.filename.as_deref(), form.content_type.as_deref()) {
        return Err(ApiError::UnsupportedMediaType(
            "Only PDF files are supported".to_string(),
        ));
    }
    if !document.starts_with(PDF_MAGIC) {
        return Err(ApiError::UnsupportedMediaType(
            "File content is not a valid PDF".to_string(),
        ));
    }

    let model = match form.model {
        Some(requested) => requested
            .parse::<GeminiModel>()
            .map_err(ApiError::BadRequest)?
            .model_id()
            .to_string(),
        None => settings.default_model.clone(),
    };

    if let Some(version) = &form.prompt_version {
        if !state.extractor.prompts().has_version(version) {
            return Err(ApiError::BadRequest(format!(
                "Unknown prompt version '{version}'. Available: {}",
                state.extractor.prompts().available_versions().join(", ")
            )));
        }
    }

    let temperature = match form.temperature.as_deref() {
        Some(raw) => raw.parse::<f32>().map_err(|_| {
            ApiError::BadRequest(format!("temperature must be a number, got '{raw}'"))
        })?,
        None => settings.temperature,
    };
    let max_tokens = match form.max_tokens.as_deref() {
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            ApiError::BadRequest(format!("max_tokens must be an integer, got '{raw}'"))
        })?,
        None => settings.max_tokens,
    };

    let request = ExtractionRequest {
        document,
        filename: form.filename.unwrap_or_else(|| "upload.pdf".to_string()),
        model,
        prompt_version: form.prompt_version,
        temperature,
        max_tokens,
        include_confidence: parse_bool(
            "include_confidence",
            form.include_confidence.as_deref(),
        )?,
        include_token_usage: parse_bool(
            "include_token_usage",
            form.include_token_usage.as_deref(),
        )?,
    };
    request.validate()?;
    Ok(request)
}

/// Extract structured fields from an uploaded quote PDF
///
/// Responds 200 when every required field was found and 206 when some
/// required fields are listed in `failed_fields`.
pub async fn extract(
    State(state): State<ApiState>,
    Extension(client): Extension<ClientKey>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    state.metrics.record_request();

    info!("Extraction request {} from key {}", request_id, client.prefix());

    let outcome = async {
        let form = read_form(
            multipart?,
            state.settings.max_file_size_bytes(),
            state.settings.max_file_size_mb,
        )
        .await?;
        let request = build_request(&state, form)?;
        info!(
            "Request {}: {} ({} bytes), model {}",
            request_id,
            request.filename,
            request.document.len(),
            request.model
        );
        state
            .extractor
            .extract(&request)
            .await
            .map_err(ApiError::from)
    }
    .await;

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            state.metrics.record_failure();
            error!("Request {} failed: {}", request_id, e);
            return Err(e);
        }
    };

    let partial = result.is_partial();
    state.metrics.record_success(partial);
    info!(
        "Request {} completed in {:.2}s ({} failed fields)",
        request_id,
        result.processing_time,
        result.failed_fields.len()
    );

    let (status_code, status) = if partial {
        (StatusCode::PARTIAL_CONTENT, ExtractStatus::PartialSuccess)
    } else {
        (StatusCode::OK, ExtractStatus::Success)
    };

    Ok((
        status_code,
        Json(ExtractResponse {
            status,
            request_id,
            result,
            timestamp: Utc::now(),
        }),
    ))
}
