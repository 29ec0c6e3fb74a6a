//! Core of the insurance quote extractor
//!
//! Everything between an uploaded PDF and the JSON the API returns, except
//! the HTTP layer and the concrete model client:
//!
//! - [`catalog`] - declarative field catalog loaded from YAML
//! - [`prompt`] - versioned prompt templates rendered against the catalog
//! - [`backend`] - the [`ExtractionBackend`] seam a hosted model plugs into
//! - [`response`] - recovering a JSON object from raw model text
//! - [`normalize`] - mapping model output onto the catalog
//! - [`hints`] - advisory per-field type hints
//! - [`pipeline`] - the [`Extractor`] tying the steps together
//! - [`settings`] - environment configuration

pub mod backend;
pub mod catalog;
pub mod error;
pub mod hints;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod response;
pub mod settings;

pub use backend::{ExtractionBackend, ModelReply, ModelRequest, TokenUsage};
pub use catalog::{FieldCatalog, FieldSpec, FieldType};
pub use error::{BackendError, CatalogError, ExtractError, PromptError};
pub use normalize::{FieldValue, NormalizedOutput, Normalizer, EMPTY_VALUE};
pub use pipeline::{ExtractionRequest, ExtractionResult, Extractor};
pub use prompt::{PromptInfo, PromptLibrary, PromptPreview, PromptVersion, RenderedPrompt};
pub use settings::Settings;
