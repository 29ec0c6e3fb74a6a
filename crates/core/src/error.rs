//! Error types for catalog loading, prompt rendering and extraction

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read field catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Field catalog contains no fields")]
    Empty,

    #[error("Invalid field name: {0}")]
    InvalidFieldName(String),

    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    #[error("Unknown type '{declared}' for field {field}")]
    UnknownType { field: String, declared: String },
}

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to read prompt library {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Prompt library defines no versions")]
    NoVersions,

    #[error("Prompt version {0} not found")]
    UnknownVersion(String),
}

/// Failures talking to the hosted model.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Model API key not configured")]
    NotConfigured,

    #[error("Failed to reach model API: {0}")]
    Transport(String),

    #[error("Model API rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Model API authentication failed: {0}")]
    Unauthorized(String),

    #[error("Model API error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Empty response from model: {0}")]
    EmptyResponse(String),

    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

/// Anything that stops one extraction request.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{message}")]
    MalformedResponse { message: String, preview: String },
}
