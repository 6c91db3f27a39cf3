//! Tallyscan Core Library
//!
//! Shared functionality for the Tallyscan receipt reader:
//! - Extraction result model and safe defaults
//! - Validation and arithmetic reconciliation of model output
//! - Tolerant coercion of raw model text into typed results
//! - Image preparation (decode, bound, re-encode)
//! - Pluggable hosted vision backends (OpenAI, Anthropic)
//! - Timeout and retry policy for model calls
//! - Prompt library with user overrides
//! - Configuration from TOML and environment

pub mod ai;
pub mod coerce;
pub mod config;
pub mod error;
pub mod extractor;
pub mod models;
pub mod preprocess;
pub mod prompts;
pub mod retry;
pub mod validate;

/// Test utilities including mock LLM server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIClient, AnthropicBackend, ExtractionBackend, MockBackend, MockReply, OpenAIBackend};
pub use coerce::{coerce, coerce_value, finalize, finalize_value, CoercionFailure};
pub use config::{Config, ProviderConfig, ProviderKind};
pub use error::{Error, Result};
pub use extractor::ReceiptExtractor;
pub use models::{AdditionalCost, ExtractionResult, ReceiptItem, PARSING_ERROR, PROCESSING_ERROR};
pub use preprocess::{ImagePreprocessor, PreparedImage};
pub use prompts::Prompt;
pub use retry::RetryPolicy;
pub use validate::{
    reconcile, validate, validate_or_default, Diagnostic, SchemaViolation, ValidationOutcome,
    TOTAL_TOLERANCE,
};
