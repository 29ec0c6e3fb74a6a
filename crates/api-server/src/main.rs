//! API Server Binary Entry Point

use quote_extract_api_server::{start_server, ApiState};
use quote_extract_core::Settings;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();

    // RUST_LOG wins over LOG_LEVEL
    let default_filter = ["quote_extract_api_server", "quote_extract_core", "quote_extract_gemini"]
        .iter()
        .map(|target| format!("{target}={}", settings.log_level))
        .chain(std::iter::once("tower_http=debug".to_string()))
        .collect::<Vec<_>>()
        .join(",");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !settings.has_gemini_key() {
        warn!("GEMINI_API_KEY is not set; extraction requests will fail with 503");
    }
    if !settings.has_api_keys() {
        warn!("API_KEYS is not set; every /api/v1 request will be rejected");
    }

    let addr = settings.server_addr.clone();
    info!(
        "Starting Quote Extraction API Server ({}, default model {})",
        settings.environment, settings.default_model
    );
    let state = ApiState::from_settings(settings)?;

    start_server(&addr, state).await?;

    Ok(())
}
