//! REST API server for insurance quote extraction
//!
//! Routes:
//! - `POST /api/v1/extract` - upload a quote PDF, get structured fields back
//! - `GET /api/v1/models`, `/api/v1/prompts[/{version}]`, `/api/v1/fields`
//! - `GET /health`, `/health/live`, `/health/ready`, `/health/metrics`
//! - `GET /` - demo page
//!
//! Everything under `/api/v1` requires an `X-API-Key` header; extraction is
//! additionally rate limited per key.

mod auth;
mod error;
mod frontend;
mod handlers;
mod metrics;
mod rate_limit;
mod types;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use quote_extract_core::{Extractor, FieldCatalog, PromptLibrary, Settings};
use quote_extract_gemini::{GeminiClient, GeminiModel};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use auth::{ClientKey, API_KEY_HEADER};
pub use error::ApiError;
pub use handlers::*;
pub use metrics::{Metrics, MetricsSnapshot};
pub use rate_limit::{RateDecision, RateLimiter};
pub use types::*;

/// Room for multipart boundaries and form fields on top of the file limit
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Settings read at startup
    pub settings: Arc<Settings>,
    /// Catalog, prompts and model backend
    pub extractor: Extractor,
    /// Per-key request windows
    pub rate_limiter: Arc<RateLimiter>,
    /// Request counters
    pub metrics: Arc<Metrics>,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl ApiState {
    /// Create state around an existing extractor
    #[must_use]
    pub fn new(mut settings: Settings, extractor: Extractor) -> Self {
        settings.default_model = resolve_default_model(&settings.default_model);
        let rate_limiter = RateLimiter::new(
            settings.rate_limit_requests,
            Duration::from_secs(settings.rate_limit_window_secs),
        );
        Self {
            settings: Arc::new(settings),
            extractor,
            rate_limiter: Arc::new(rate_limiter),
            metrics: Arc::new(Metrics::default()),
            started_at: Instant::now(),
        }
    }

    /// Load catalog and prompts from `settings.config_dir` and connect the
    /// Gemini backend.
    ///
    /// # Errors
    /// Returns an error if a config file is invalid or the HTTP client cannot
    /// be created.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let catalog = FieldCatalog::load_or_builtin(&settings.config_dir)
            .context("Failed to load field catalog")?;
        let prompts = PromptLibrary::load_or_builtin(&settings.config_dir)
            .context("Failed to load prompt library")?;
        let backend =
            GeminiClient::from_settings(&settings).context("Failed to create Gemini client")?;

        info!(
            "Loaded {} fields, prompt versions {:?} (default {})",
            catalog.len(),
            prompts.available_versions(),
            prompts.default_version()
        );

        let extractor = Extractor::new(Arc::new(catalog), Arc::new(prompts), Arc::new(backend));
        Ok(Self::new(settings, extractor))
    }

    /// Seconds since the state was created
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

// The default obeys the same model list as per-request overrides
fn resolve_default_model(configured: &str) -> String {
    match configured.parse::<GeminiModel>() {
        Ok(model) => model.model_id().to_string(),
        Err(e) => {
            let fallback = GeminiModel::default();
            warn!("DEFAULT_MODEL ignored ({}); using {}", e, fallback);
            fallback.model_id().to_string()
        }
    }
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    if settings.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)])
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    let body_limit = usize::try_from(state.settings.max_file_size_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    // Rate limiting sits inside authentication: unknown keys never consume quota
    let extract_route = post(extract)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce_rate_limit,
        ))
        .layer(DefaultBodyLimit::max(body_limit));

    let api = Router::new()
        .route("/api/v1/extract", extract_route)
        .route("/api/v1/models", get(list_models))
        .route("/api/v1/prompts", get(list_prompts))
        .route("/api/v1/prompts/{version}", get(get_prompt))
        .route("/api/v1/fields", get(list_fields))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        // Demo frontend
        .route("/", get(frontend::index))
        // Health and monitoring
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/health/metrics", get(metrics_report))
        .merge(api)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.settings))
        .with_state(state)
}

/// Serve on an already bound listener
pub async fn serve(listener: TcpListener, state: ApiState) -> Result<(), std::io::Error> {
    axum::serve(listener, build_router(state)).await
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    info!("Starting API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
