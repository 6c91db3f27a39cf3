//! Pluggable vision model backend abstraction
//!
//! This module provides a provider-agnostic interface for the one model call
//! Tallyscan makes: "here is a receipt image and an instruction, give me
//! text back". Turning that text into a typed result is the job of
//! [`crate::coerce`], so no backend assumes its provider enforces a schema.
//!
//! # Architecture
//!
//! - `ExtractionBackend` trait: defines the interface for all backends
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAIBackend`, `AnthropicBackend`, `MockBackend`
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = AIClient::from_config(&config.provider)?;
//! let raw = client.extract(prompt.system(), prompt.user(), &image).await?;
//! ```

mod anthropic;
mod mock;
mod openai;

pub use anthropic::AnthropicBackend;
pub use mock::{MockBackend, MockReply, SAMPLE_RECEIPT_JSON};
pub use openai::OpenAIBackend;

use async_trait::async_trait;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::preprocess::PreparedImage;

/// Trait defining the interface for all vision model backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Send the instructions and image, returning the model's raw text reply
    async fn extract(&self, system: &str, user: &str, image: &PreparedImage) -> Result<String>;

    /// Check if the provider is reachable with the configured credentials
    async fn health_check(&self) -> bool;

    /// Provider name (for logging and the health endpoint)
    fn name(&self) -> &'static str;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI chat completions API (or any compatible server)
    OpenAI(OpenAIBackend),
    /// Anthropic Messages API
    Anthropic(AnthropicBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create a client for the configured provider
    ///
    /// Fails when the selected provider has no API key.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let missing_key = |var: &str| {
            Error::Config(format!(
                "No API key for provider '{}'. Set {}.",
                config.kind, var
            ))
        };

        match config.kind {
            ProviderKind::OpenAI => {
                let endpoint = &config.openai;
                let key = endpoint
                    .api_key
                    .as_deref()
                    .ok_or_else(|| missing_key("OPENAI_API_KEY"))?;
                Ok(AIClient::OpenAI(OpenAIBackend::new(
                    &endpoint.base_url,
                    &endpoint.model,
                    key,
                )))
            }
            ProviderKind::Anthropic => {
                let endpoint = &config.anthropic;
                let key = endpoint
                    .api_key
                    .as_deref()
                    .ok_or_else(|| missing_key("ANTHROPIC_API_KEY"))?;
                Ok(AIClient::Anthropic(AnthropicBackend::new(
                    &endpoint.base_url,
                    &endpoint.model,
                    key,
                )))
            }
            ProviderKind::Mock => Ok(AIClient::Mock(match &config.mock_response {
                Some(reply) => MockBackend::with_reply(MockReply::Text(reply.clone())),
                None => MockBackend::new(),
            })),
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

// Implement ExtractionBackend for AIClient by delegating to the inner backend
#[async_trait]
impl ExtractionBackend for AIClient {
    async fn extract(&self, system: &str, user: &str, image: &PreparedImage) -> Result<String> {
        match self {
            AIClient::OpenAI(b) => b.extract(system, user, image).await,
            AIClient::Anthropic(b) => b.extract(system, user, image).await,
            AIClient::Mock(b) => b.extract(system, user, image).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAI(b) => b.health_check().await,
            AIClient::Anthropic(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AIClient::OpenAI(b) => b.name(),
            AIClient::Anthropic(b) => b.name(),
            AIClient::Mock(b) => b.name(),
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAI(b) => b.model(),
            AIClient::Anthropic(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAI(b) => b.host(),
            AIClient::Anthropic(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// Truncate an upstream error body for logs and error messages
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
