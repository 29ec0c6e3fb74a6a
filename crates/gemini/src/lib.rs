//! Gemini backend for insurance quote extraction
//!
//! [`GeminiClient`] implements [`quote_extract_core::ExtractionBackend`] over
//! the public `generateContent` REST API.
//!
//! ```no_run
//! use quote_extract_core::{ExtractionBackend, ModelRequest};
//! use quote_extract_gemini::{GeminiClient, GeminiModel};
//!
//! # async fn example() -> Result<(), quote_extract_core::BackendError> {
//! let client = GeminiClient::new(std::env::var("GEMINI_API_KEY").ok())?;
//! let pdf = std::fs::read("quote.pdf").unwrap_or_default();
//! let reply = client
//!     .generate(&ModelRequest {
//!         document: &pdf,
//!         mime_type: "application/pdf",
//!         prompt: "Extract the quote number as JSON",
//!         model: GeminiModel::Flash15.model_id(),
//!         temperature: 0.1,
//!         max_tokens: 1024,
//!     })
//!     .await?;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod models;

pub use client::{GeminiClient, DEFAULT_API_BASE};
pub use models::{GeminiModel, ModelInfo};
