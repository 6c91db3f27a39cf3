//! Mock backend for testing
//!
//! Returns a canned reply without any network traffic. Useful for unit tests,
//! local development, and running the server without provider credentials.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::preprocess::PreparedImage;

use super::ExtractionBackend;

/// Reply used when no canned reply is configured: a valid two-item lunch receipt
pub const SAMPLE_RECEIPT_JSON: &str = r#"{
  "items": [
    {"name": "Club Sandwich", "quantity": 1, "price": 12.5},
    {"name": "Iced Tea", "quantity": 2, "price": 3.25}
  ],
  "additionalCosts": [
    {"name": "Sales Tax", "amount": 1.52, "includedInSubtotal": false},
    {"name": "Tip", "amount": 3.0, "includedInSubtotal": false}
  ],
  "totalPrice": 23.52,
  "currency": "USD",
  "currencySymbol": "$"
}"#;

/// What the mock returns from `extract`
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Raw model text
    Text(String),
    /// Simulated upstream HTTP failure
    Fail { status: u16, body: String },
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    reply: MockReply,
    /// Whether health_check should return true
    pub healthy: bool,
    calls: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, sample receipt reply)
    pub fn new() -> Self {
        Self::with_reply(MockReply::Text(SAMPLE_RECEIPT_JSON.to_string()))
    }

    pub fn with_reply(reply: MockReply) -> Self {
        Self {
            reply,
            healthy: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shorthand for a text reply
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_reply(MockReply::Text(text.into()))
    }

    /// Create a mock whose every call fails with the given HTTP status
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        Self::with_reply(MockReply::Fail {
            status,
            body: body.into(),
        })
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    pub fn reply(&self) -> &MockReply {
        &self.reply
    }

    /// Number of `extract` calls made, shared across clones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    async fn extract(&self, _system: &str, _user: &str, _image: &PreparedImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Fail { status, body } => Err(Error::Upstream {
                status: *status,
                body: body.clone(),
            }),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::coerce;
    use crate::test_utils::sample_image;
    use crate::validate::validate;

    #[test]
    fn test_sample_reply_is_valid() {
        let result = coerce(SAMPLE_RECEIPT_JSON).unwrap();
        let outcome = validate(result);
        assert!(outcome.is_accepted());
    }

    #[tokio::test]
    async fn test_calls_shared_across_clones() {
        let mock = MockBackend::replying("{}");
        let clone = mock.clone();
        let image = sample_image();

        clone.extract("s", "u", &image).await.unwrap();
        mock.extract("s", "u", &image).await.unwrap();
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_reply() {
        let mock = MockBackend::failing(503, "overloaded");
        let err = mock.extract("s", "u", &sample_image()).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unhealthy() {
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
