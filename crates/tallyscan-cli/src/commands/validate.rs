//! Stored response validation command

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tallyscan_core::{coerce, reconcile, validate, ExtractionResult, ValidationOutcome};

/// Coerce and validate a saved model response, printing the accepted result
///
/// Fails (non-zero exit) when the response could not be coerced or breaks a
/// schema rule.
pub fn cmd_validate(file: &Path) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let result = check_response(&raw)?;
    let diagnostics = reconcile(&result);

    println!("✅ Accepted");
    println!("   Items: {}", result.items.len());
    println!(
        "   Total: {} {}",
        result.total_price, result.currency
    );
    if let Some(error_text) = result.error_text.as_deref() {
        println!("   Error text: {}", error_text);
    }
    if diagnostics.is_empty() {
        println!("   No advisories");
    } else {
        for diagnostic in &diagnostics {
            println!("   ⚠️  {}", diagnostic);
        }
    }

    println!();
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Run coercion and validation, turning either failure into an error
pub fn check_response(raw: &str) -> Result<ExtractionResult> {
    let result = coerce(raw).context("Response could not be coerced")?;
    match validate(result) {
        ValidationOutcome::Accepted(result) => Ok(result),
        ValidationOutcome::Rejected(violation) => bail!("Rejected: {}", violation),
    }
}
