//! Mapping failures onto HTTP responses
//!
//! Every error body is `{"detail": "..."}`.

use crate::types::ErrorResponse;
use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use quote_extract_core::{BackendError, ExtractError, PromptError};
use thiserror::Error;
use tracing::error;

/// Suggested wait after the model API itself reported a quota error
const UPSTREAM_RETRY_AFTER_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API key required. Please provide X-API-Key header.")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded: {limit} requests per {window_secs} seconds")]
    RateLimited {
        limit: u32,
        window_secs: u64,
        retry_after_secs: u64,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("File too large. Maximum size is {max_mb}MB")]
    FileTooLarge { max_mb: u64 },

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Failed to extract data: {0}")]
    Unprocessable(String),

    #[error("API rate limit exceeded. Please try again later.")]
    UpstreamRateLimited,

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingApiKey | Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } | Self::UpstreamRateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a multipart read failure; body-limit overruns become 413.
    #[must_use]
    pub fn from_multipart(err: &MultipartError, max_mb: u64) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::FileTooLarge { max_mb }
        } else {
            Self::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(format!(
            "Expected a multipart/form-data body: {}",
            rejection.body_text()
        ))
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::InvalidRequest(message) => Self::BadRequest(message),
            ExtractError::Prompt(PromptError::UnknownVersion(version)) => {
                Self::BadRequest(format!("Unknown prompt version: {version}"))
            }
            ExtractError::Prompt(other) => Self::Internal(other.to_string()),
            ExtractError::MalformedResponse { message, .. } => Self::Unprocessable(message),
            ExtractError::Backend(BackendError::RateLimited(_)) => Self::UpstreamRateLimited,
            ExtractError::Backend(BackendError::Unauthorized(_) | BackendError::NotConfigured) => {
                Self::ServiceUnavailable("AI service authentication failed".to_string())
            }
            ExtractError::Backend(_) => {
                Self::ServiceUnavailable("AI service is currently unavailable".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(message) = &self {
            error!("Internal error: {}", message);
        }
        let detail = self.to_string();

        let mut response = (status, Json(ErrorResponse { detail })).into_response();
        let headers = response.headers_mut();
        match &self {
            Self::MissingApiKey | Self::InvalidApiKey => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("ApiKey"));
            }
            Self::RateLimited {
                retry_after_secs, ..
            } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            }
            Self::UpstreamRateLimited => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(UPSTREAM_RETRY_AFTER_SECS));
            }
            _ => {}
        }
        response
    }
}
