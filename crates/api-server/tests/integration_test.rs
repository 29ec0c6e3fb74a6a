//! Integration tests for the API server
//!
//! Requests go through the full router (auth, rate limiting, multipart
//! parsing, pipeline, normalization) with a scripted model backend in place
//! of Gemini.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use quote_extract_api_server::{build_router, serve, ApiState};
use quote_extract_core::{
    BackendError, ExtractionBackend, Extractor, FieldCatalog, ModelReply, ModelRequest,
    PromptLibrary, Settings, TokenUsage,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

const API_KEY: &str = "test-key-123";
const BOUNDARY: &str = "quote-extract-test-boundary";
const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

const FULL_REPLY: &str = r#"```json
{
  "quote_number": "01WECBA3BVG003",
  "policy_effective_date": "01/01/2025",
  "policy_expiration_date": "01/01/2026",
  "named_insured_name": "Acme Widgets LLC",
  "named_insured_address": "1 Main St, Springfield, IL 62701",
  "issuing_carrier": ["NY - Hartford Casualty Insurance Company - 553"],
  "commission": "EMPTY VALUE"
}
```"#;

const PARTIAL_REPLY: &str = r#"{
  "quote_number": "01WECBA3BVG003",
  "policy_effective_date": "01/01/2025",
  "policy_expiration_date": "01/01/2026",
  "named_insured_name": "Acme Widgets LLC"
}"#;

/// Backend returning a fixed reply and counting calls
struct ScriptedBackend {
    reply: Result<String, fn() -> BackendError>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(make: fn() -> BackendError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(make),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &ModelRequest<'_>) -> Result<ModelReply, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(ModelReply {
                text: text.clone(),
                model: request.model.to_string(),
                usage: Some(TokenUsage {
                    prompt_token_count: 2000,
                    candidates_token_count: 400,
                    total_token_count: 2400,
                    estimated_cost: Some(0.0003),
                }),
            }),
            Err(make) => Err(make()),
        }
    }
}

fn test_settings() -> Settings {
    Settings {
        api_keys: vec![API_KEY.to_string()],
        gemini_api_key: Some("unused".to_string()),
        ..Settings::default()
    }
}

fn app_with(settings: Settings, backend: Arc<ScriptedBackend>) -> Router {
    let extractor = Extractor::new(
        Arc::new(FieldCatalog::builtin().unwrap()),
        Arc::new(PromptLibrary::builtin().unwrap()),
        backend,
    );
    build_router(ApiState::new(settings, extractor))
}

fn app(backend: Arc<ScriptedBackend>) -> Router {
    app_with(test_settings(), backend)
}

/// Hand-built multipart/form-data body
#[derive(Default)]
struct Form {
    body: Vec<u8>,
}

impl Form {
    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn pdf(self) -> Self {
        self.file("quote.pdf", "application/pdf", PDF_BYTES)
    }

    fn into_request(mut self, api_key: Option<&str>) -> Request<Body> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/extract")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(key) = api_key {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

fn get(uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = app(ScriptedBackend::replying(FULL_REPLY));

    let (status, _, json) = send(app.clone(), get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["fields_count"], 18);
    assert_eq!(json["default_prompt_version"], "v2");
    assert_eq!(json["available_models"].as_array().unwrap().len(), 3);

    let (status, _, json) = send(app.clone(), get("/health/live", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "alive");

    let (status, _, json) = send(app, get("/health/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ready");
}

#[tokio::test]
async fn test_not_ready_without_client_keys() {
    let settings = Settings {
        api_keys: Vec::new(),
        ..test_settings()
    };
    let app = app_with(settings, ScriptedBackend::replying(FULL_REPLY));

    let (status, _, json) = send(app.clone(), get("/health/ready", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["reasons"][0], "No API keys configured");

    let (_, _, json) = send(app, get("/health", None)).await;
    assert_eq!(json["status"], "degraded");
}

#[tokio::test]
async fn test_missing_api_key_rejected_before_model_call() {
    let backend = ScriptedBackend::replying(FULL_REPLY);
    let app = app(backend.clone());

    let (status, headers, json) = send(app, Form::default().pdf().into_request(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["detail"], "API key required. Please provide X-API-Key header.");
    assert_eq!(headers[header::WWW_AUTHENTICATE], "ApiKey");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_invalid_api_key_rejected() {
    let backend = ScriptedBackend::replying(FULL_REPLY);
    let app = app(backend.clone());

    let request = Form::default().pdf().into_request(Some("wrong"));
    let (status, _, json) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["detail"], "Invalid API key");
    assert_eq!(backend.calls(), 0);

    let (status, _, _) = send(app, get("/api/v1/fields", Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_successful_extraction() {
    let backend = ScriptedBackend::replying(FULL_REPLY);
    let app = app(backend.clone());

    let request = Form::default()
        .pdf()
        .text("model", "gemini-1.5-flash")
        .text("include_confidence", "true")
        .into_request(Some(API_KEY));
    let (status, _, json) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.calls(), 1);
    assert_eq!(json["status"], "success");
    assert_eq!(json["extracted_data"]["quote_number"], "01WECBA3BVG003");
    assert_eq!(
        json["extracted_data"]["issuing_carrier"][0],
        "NY - Hartford Casualty Insurance Company - 553"
    );
    assert_eq!(json["extracted_data"]["commission"], "EMPTY VALUE");
    assert!(json["failed_fields"].as_array().unwrap().is_empty());
    assert_eq!(json["model_used"], "gemini-1.5-flash");
    assert_eq!(json["prompt_version"], "v2");
    assert!(json["processing_time"].as_f64().unwrap() >= 0.0);
    assert!(json["request_id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(json.get("token_usage").is_none());

    let scores = json["confidence_scores"].as_object().unwrap();
    let data = json["extracted_data"].as_object().unwrap();
    assert!(scores.contains_key("quote_number"));
    for (field, score) in scores {
        assert!(data.contains_key(field), "score for unknown field {field}");
        let score = score.as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
    assert_eq!(scores["commission"], 0.0);
}

#[tokio::test]
async fn test_extraction_without_confidence_and_with_token_usage() {
    let app = app(ScriptedBackend::replying(FULL_REPLY));

    let request = Form::default()
        .pdf()
        .text("include_confidence", "false")
        .text("include_token_usage", "true")
        .text("prompt_version", "v1")
        .into_request(Some(API_KEY));
    let (status, _, json) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["confidence_scores"].as_object().unwrap().is_empty());
    assert_eq!(json["prompt_version"], "v1");
    assert_eq!(json["token_usage"]["total_token_count"], 2400);
}

#[tokio::test]
async fn test_partial_extraction_returns_206() {
    let app = app(ScriptedBackend::replying(PARTIAL_REPLY));

    let (status, _, json) = send(app, Form::default().pdf().into_request(Some(API_KEY))).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(json["status"], "partial_success");
    assert_eq!(json["failed_fields"], serde_json::json!(["named_insured_address"]));
    assert_eq!(json["extracted_data"]["quote_number"], "01WECBA3BVG003");
    assert!(json["extracted_data"].get("named_insured_address").is_none());
    assert!(json["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|w| w.as_str().is_some_and(|w| w.contains("named_insured_address"))));
}

#[tokio::test]
async fn test_unparseable_reply_returns_422() {
    let app = app(ScriptedBackend::replying("I could not read this document."));

    let (status, _, json) = send(app, Form::default().pdf().into_request(Some(API_KEY))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["detail"], "Failed to extract data: Could not parse JSON from model response");
}

#[tokio::test]
async fn test_backend_failure_returns_503() {
    let backend = ScriptedBackend::failing(|| BackendError::Transport("connection reset".into()));
    let app = app(backend);

    let (status, _, json) = send(app, Form::default().pdf().into_request(Some(API_KEY))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["detail"], "AI service is currently unavailable");
}

#[tokio::test]
async fn test_upstream_quota_returns_429() {
    let backend = ScriptedBackend::failing(|| BackendError::RateLimited("quota".into()));
    let app = app(backend);

    let (status, headers, json) =
        send(app, Form::default().pdf().into_request(Some(API_KEY))).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers[header::RETRY_AFTER], "60");
    assert_eq!(json["detail"], "API rate limit exceeded. Please try again later.");
}

#[tokio::test]
async fn test_rate_limit_per_key() {
    let backend = ScriptedBackend::replying(FULL_REPLY);
    let settings = Settings {
        rate_limit_requests: 1,
        rate_limit_window_secs: 60,
        ..test_settings()
    };
    let app = app_with(settings, backend.clone());

    let (status, _, _) = send(app.clone(), Form::default().pdf().into_request(Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, json) =
        send(app.clone(), Form::default().pdf().into_request(Some(API_KEY))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key(header::RETRY_AFTER));
    assert_eq!(json["detail"], "Rate limit exceeded: 1 requests per 60 seconds");
    assert_eq!(backend.calls(), 1);

    // Metadata routes are not rate limited
    let (status, _, _) = send(app.clone(), get("/api/v1/models", Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, json) = send(app, get("/health/metrics", None)).await;
    assert_eq!(json["counters"]["rate_limited"], 1);
    assert_eq!(json["counters"]["extractions_succeeded"], 1);
    assert_eq!(json["limits"]["rate_limit_requests"], 1);
}

#[tokio::test]
async fn test_oversized_file_returns_413() {
    let backend = ScriptedBackend::replying(FULL_REPLY);
    let settings = Settings {
        max_file_size_mb: 1,
        ..test_settings()
    };
    let app = app_with(settings, backend.clone());

    let mut data = PDF_BYTES.to_vec();
    data.resize(1024 * 1024 + 512 * 1024, b' ');
    let request = Form::default()
        .file("big.pdf", "application/pdf", &data)
        .into_request(Some(API_KEY));
    let (status, _, json) = send(app, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["detail"], "File too large. Maximum size is 1MB");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_non_pdf_returns_415() {
    let backend = ScriptedBackend::replying(FULL_REPLY);
    let app = app(backend.clone());

    let request = Form::default()
        .file("notes.txt", "text/plain", b"just some notes")
        .into_request(Some(API_KEY));
    let (status, _, json) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["detail"], "Only PDF files are supported");

    // Right name, wrong content
    let request = Form::default()
        .file("quote.pdf", "application/pdf", b"PK\x03\x04 not a pdf")
        .into_request(Some(API_KEY));
    let (status, _, _) = send(app, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_bad_form_input_returns_400() {
    let backend = ScriptedBackend::replying(FULL_REPLY);
    let app = app(backend.clone());

    let cases = [
        (Form::default().text("model", "gemini-1.5-flash"), "No file provided"),
        (
            Form::default().file("empty.pdf", "application/pdf", b""),
            "Uploaded file is empty",
        ),
    ];
    for (form, detail) in cases {
        let (status, _, json) = send(app.clone(), form.into_request(Some(API_KEY))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["detail"], detail);
    }

    let bad_params = [
        ("model", "gpt-4"),
        ("temperature", "1.5"),
        ("temperature", "warm"),
        ("max_tokens", "0"),
        ("include_confidence", "maybe"),
        ("prompt_version", "v9"),
    ];
    for (name, value) in bad_params {
        let request = Form::default()
            .pdf()
            .text(name, value)
            .into_request(Some(API_KEY));
        let (status, _, json) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name}={value}");
        assert!(json["detail"].is_string());
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_metadata_endpoints() {
    let app = app(ScriptedBackend::replying(FULL_REPLY));

    let (status, _, json) = send(app.clone(), get("/api/v1/fields", Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 18);
    assert_eq!(json["required"].as_array().unwrap().len(), 5);
    assert_eq!(json["fields"][0]["name"], "quote_number");

    let (status, _, json) = send(app.clone(), get("/api/v1/models", Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["models"].as_array().unwrap().len(), 3);
    assert_eq!(json["default_model"], "gemini-1.5-flash");

    let (status, _, json) = send(app.clone(), get("/api/v1/prompts", Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["default_version"], "v2");
    assert_eq!(json["versions"].as_array().unwrap().len(), 2);

    let (status, _, json) = send(
        app.clone(),
        get("/api/v1/prompts/v1?preview=true&max_length=50", Some(API_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], "v1");
    assert_eq!(json["is_default"], false);
    assert_eq!(json["preview"]["truncated"], true);

    let (status, _, json) = send(app.clone(), get("/api/v1/prompts/v2", Some(API_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.get("preview").is_none());

    let (status, _, json) = send(app, get("/api/v1/prompts/v9", Some(API_KEY))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["detail"], "Prompt version v9 not found");
}

#[tokio::test]
async fn test_frontend_served_without_key() {
    let app = app(ScriptedBackend::replying(FULL_REPLY));
    let response = app.oneshot(get("/", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("/api/v1/extract"));
}

#[tokio::test]
async fn test_health_over_tcp() {
    let extractor = Extractor::new(
        Arc::new(FieldCatalog::builtin().unwrap()),
        Arc::new(PromptLibrary::builtin().unwrap()),
        ScriptedBackend::replying(FULL_REPLY),
    );
    let state = ApiState::new(test_settings(), extractor);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve(listener, state));

    let json: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());

    server.abort();
}
