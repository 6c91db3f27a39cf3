//! Local extraction command

use std::path::Path;

use anyhow::{Context, Result};
use tallyscan_core::{reconcile, Config, ExtractionResult, ReceiptExtractor};

/// Extract a receipt image with the configured provider and print the JSON result
pub async fn cmd_extract(config: &Config, image: &Path, pretty: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let extractor =
        ReceiptExtractor::from_config(config).context("Failed to set up receipt extractor")?;

    let result = extract_file(&extractor, image).await?;
    for diagnostic in reconcile(&result) {
        eprintln!("⚠️  {}", diagnostic);
    }

    println!("{}", render(&result, pretty)?);
    Ok(())
}

/// Read `image` and run it through `extractor`
pub async fn extract_file(extractor: &ReceiptExtractor, image: &Path) -> Result<ExtractionResult> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;

    extractor
        .extract(bytes)
        .await
        .with_context(|| format!("Extraction failed for {}", image.display()))
}

pub fn render(result: &ExtractionResult, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    Ok(json)
}
