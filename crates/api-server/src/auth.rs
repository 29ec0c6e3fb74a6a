//! `X-API-Key` authentication middleware

use crate::{ApiError, ApiState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticated client key, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(pub String);

impl ClientKey {
    /// First characters of the key, safe to log
    #[must_use]
    pub fn prefix(&self) -> String {
        key_prefix(&self.0)
    }
}

pub(crate) fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(3).collect();
    format!("{prefix}...")
}

// Compare without exiting on the first differing byte
fn keys_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Reject requests without a configured API key.
pub async fn require_api_key(
    State(state): State<ApiState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from);

    let Some(provided) = provided else {
        warn!("Request to {} without API key", request.uri().path());
        state.metrics.record_auth_failure();
        return Err(ApiError::MissingApiKey);
    };

    if !state
        .settings
        .api_keys
        .iter()
        .any(|expected| keys_match(expected, &provided))
    {
        warn!(
            "Invalid API key {} for {}",
            key_prefix(&provided),
            request.uri().path()
        );
        state.metrics.record_auth_failure();
        return Err(ApiError::InvalidApiKey);
    }

    debug!("Authenticated key {}", key_prefix(&provided));
    request.extensions_mut().insert(ClientKey(provided));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("secret-key", "secret-key"));
        assert!(!keys_match("secret-key", "secret-kez"));
        assert!(!keys_match("secret-key", "secret"));
        assert!(!keys_match("", "x"));
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix("abcdef"), "abc...");
        assert_eq!(key_prefix("ab"), "ab...");
        assert_eq!(ClientKey("xyz123".to_string()).prefix(), "xyz...");
    }
}
