//! Service configuration read from environment variables

use std::env;
use std::path::PathBuf;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Largest accepted `MAX_FILE_SIZE_MB`
pub const MAX_FILE_SIZE_MB_LIMIT: u64 = 1024;

/// Runtime settings, read once at startup
#[derive(Clone, PartialEq)]
pub struct Settings {
    /// Accepted values for the `X-API-Key` header
    pub api_keys: Vec<String>,

    /// Key for the hosted model API
    pub gemini_api_key: Option<String>,

    /// Base URL of the model API (overridable for proxies and tests)
    pub gemini_api_base: String,

    /// Model used when a request does not name one
    pub default_model: String,

    /// Default max output tokens (1-8192)
    pub max_tokens: u32,

    /// Default sampling temperature (0.0-1.0)
    pub temperature: f32,

    /// Upload limit in megabytes
    pub max_file_size_mb: u64,

    /// Requests allowed per window and client; 0 disables limiting
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,

    /// Timeout for one model call
    pub request_timeout_secs: u64,

    /// Directory holding `fields.yaml` and `prompts.yaml`
    pub config_dir: PathBuf,

    /// `development` enables permissive CORS
    pub environment: String,

    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,

    /// Listen address
    pub server_addr: String,
}

impl Settings {
    /// Create settings from environment variables
    ///
    /// Environment variables:
    /// - `API_KEYS`: comma separated client keys (`API_KEY` also accepted)
    /// - `GEMINI_API_KEY`: model API key
    /// - `GEMINI_API_BASE`: model API base URL
    /// - `DEFAULT_MODEL`: default model (default: "gemini-1.5-flash")
    /// - `MAX_TOKENS`: default max output tokens (default: 4096)
    /// - `TEMPERATURE`: default temperature (default: 0.1)
    /// - `MAX_FILE_SIZE_MB`: upload limit, 1-1024 (default: 10)
    /// - `RATE_LIMIT_REQUESTS` / `RATE_LIMIT_WINDOW_SECS`: (default: 10 / 60)
    /// - `REQUEST_TIMEOUT_SECS`: model call timeout (default: 120)
    /// - `CONFIG_DIR`: catalog and prompt directory (default: "config")
    /// - `ENVIRONMENT`: deployment name (default: "development")
    /// - `LOG_LEVEL`: log filter (default: "info")
    /// - `API_SERVER_ADDR`: listen address (default: "0.0.0.0:8000")
    #[must_use = "creates settings from environment variables"]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Unparseable values fall
    /// back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_keys = non_empty("API_KEYS")
            .or_else(|| non_empty("API_KEY"))
            .map(|raw| parse_key_list(&raw))
            .unwrap_or_default();

        Self {
            api_keys,
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_api_base: non_empty("GEMINI_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_api_base),
            default_model: non_empty("DEFAULT_MODEL").unwrap_or(defaults.default_model),
            max_tokens: non_empty("MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .filter(|t: &u32| (1..=8192).contains(t))
                .unwrap_or(defaults.max_tokens),
            temperature: non_empty("TEMPERATURE")
                .and_then(|s| s.parse().ok())
                .filter(|t: &f32| (0.0..=1.0).contains(t))
                .unwrap_or(defaults.temperature),
            max_file_size_mb: non_empty("MAX_FILE_SIZE_MB")
                .and_then(|s| s.parse().ok())
                .filter(|mb: &u64| (1..=MAX_FILE_SIZE_MB_LIMIT).contains(mb))
                .unwrap_or(defaults.max_file_size_mb),
            rate_limit_requests: non_empty("RATE_LIMIT_REQUESTS")
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(defaults.rate_limit_requests),
            rate_limit_window_secs: non_empty("RATE_LIMIT_WINDOW_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(defaults.rate_limit_window_secs),
            request_timeout_secs: non_empty("REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(defaults.request_timeout_secs),
            config_dir: non_empty("CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_dir),
            environment: non_empty("ENVIRONMENT")
                .map(|e| e.to_lowercase())
                .unwrap_or(defaults.environment),
            log_level: non_empty("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or(defaults.log_level),
            server_addr: non_empty("API_SERVER_ADDR").unwrap_or(defaults.server_addr),
        }
    }

    #[must_use]
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    #[must_use]
    pub fn has_api_keys(&self) -> bool {
        !self.api_keys.is_empty()
    }

    #[must_use]
    pub fn has_gemini_key(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

impl Default for Settings {
    #[inline]
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            gemini_api_key: None,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            max_file_size_mb: 10,
            rate_limit_requests: 10,
            rate_limit_window_secs: 60,
            request_timeout_secs: 120,
            config_dir: PathBuf::from("config"),
            environment: "development".to_string(),
            log_level: "info".to_string(),
            server_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

// Secrets never reach the logs
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_keys", &format_args!("[{} configured]", self.api_keys.len()))
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("gemini_api_base", &self.gemini_api_base)
            .field("default_model", &self.default_model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("rate_limit_requests", &self.rate_limit_requests)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("config_dir", &self.config_dir)
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("server_addr", &self.server_addr)
            .finish()
    }
}
