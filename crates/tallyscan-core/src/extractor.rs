//! Receipt extraction pipeline
//!
//! Ties the stages together: image preparation, the model call under the
//! retry policy, then coercion and validation of whatever text comes back.
//! Only the first two stages can fail; a bad model answer still yields an
//! `ExtractionResult` (the safe default).

use std::time::Instant;

use tracing::{debug, error, info};

use crate::ai::{AIClient, ExtractionBackend};
use crate::coerce::finalize;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::ExtractionResult;
use crate::preprocess::{ImagePreprocessor, PreparedImage};
use crate::prompts::Prompt;
use crate::retry::RetryPolicy;

/// Turns uploaded receipt images into validated extraction results
#[derive(Clone)]
pub struct ReceiptExtractor {
    preprocessor: ImagePreprocessor,
    client: AIClient,
    prompt: Prompt,
    retry: RetryPolicy,
}

impl ReceiptExtractor {
    pub fn new(
        preprocessor: ImagePreprocessor,
        client: AIClient,
        prompt: Prompt,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            preprocessor,
            client,
            prompt,
            retry,
        }
    }

    /// Build the pipeline from configuration
    ///
    /// Fails if the provider has no credentials or the prompt override
    /// cannot be parsed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = AIClient::from_config(&config.provider)?;
        let prompts_dir = config.prompts_dir();
        let prompt = Prompt::load(prompts_dir.as_deref())?;
        let preprocessor =
            ImagePreprocessor::new(config.image.max_dimension, config.image.jpeg_quality);

        Ok(Self::new(
            preprocessor,
            client,
            prompt,
            RetryPolicy::from(&config.retry),
        ))
    }

    pub fn client(&self) -> &AIClient {
        &self.client
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    /// Run the full pipeline on raw upload bytes
    pub async fn extract(&self, bytes: Vec<u8>) -> Result<ExtractionResult> {
        let started = Instant::now();
        let image = self.prepare(bytes).await?;
        let fingerprint = image.fingerprint.clone();
        debug!(
            fingerprint = %fingerprint,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Image prepared"
        );

        let call_started = Instant::now();
        let raw = self
            .retry
            .run(|| {
                self.client
                    .extract(self.prompt.system(), self.prompt.user(), &image)
            })
            .await
            .map_err(|e| {
                error!(
                    fingerprint = %fingerprint,
                    provider = self.client.name(),
                    model = %self.client.model(),
                    error = %e,
                    "Model call failed"
                );
                e
            })?;
        debug!(
            fingerprint = %fingerprint,
            elapsed_ms = call_started.elapsed().as_millis() as u64,
            response_len = raw.len(),
            "Model responded"
        );

        let result = finalize(&raw);
        info!(
            fingerprint = %fingerprint,
            items = result.items.len(),
            total = result.total_price,
            currency = %result.currency,
            error_text = result.error_text.as_deref().unwrap_or(""),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Receipt extracted"
        );
        Ok(result)
    }

    /// Decode and resize off the async runtime
    async fn prepare(&self, bytes: Vec<u8>) -> Result<PreparedImage> {
        let preprocessor = self.preprocessor.clone();
        tokio::task::spawn_blocking(move || preprocessor.prepare(&bytes))
            .await
            .map_err(|e| Error::ImageProcessing(format!("preprocessing task failed: {}", e)))?
    }
}
