//! Anthropic Messages API backend
//!
//! # Configuration
//!
//! - `ANTHROPIC_API_KEY`: API key (required)
//! - `ANTHROPIC_BASE_URL`: Server URL (default: https://api.anthropic.com)
//! - `ANTHROPIC_MODEL`: Model name (default: claude-3-5-haiku-latest)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::preprocess::PreparedImage;

use super::{truncate_body, ExtractionBackend};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic vision backend
#[derive(Clone)]
pub struct AnthropicBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

/// Anthropic Messages API request
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

/// Request content block types
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

/// Anthropic Messages API response
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Response content blocks; only text is used
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn build_request(&self, system: &str, user: &str, image: &PreparedImage) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: 4096,
            temperature: 0.1,
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64".to_string(),
                            media_type: image.mime_type.to_string(),
                            data: image.to_base64(),
                        },
                    },
                    ContentBlock::Text {
                        text: user.to_string(),
                    },
                ],
            }],
            system: (!system.is_empty()).then(|| system.to_string()),
        }
    }
}

#[async_trait]
impl ExtractionBackend for AnthropicBackend {
    async fn extract(&self, system: &str, user: &str, image: &PreparedImage) -> Result<String> {
        let request = self.build_request(system, user, image);

        debug!(
            model = %self.model,
            image = %image.fingerprint,
            "Sending Anthropic messages request"
        );

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status,
                body: truncate_body(&body),
            });
        }

        let messages_response: MessagesResponse = response.json().await?;
        debug!(stop_reason = ?messages_response.stop_reason, "Anthropic response received");

        let text: Vec<String> = messages_response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect();

        Ok(text.join("\n"))
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
