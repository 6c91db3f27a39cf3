//! Coercion of raw model output into typed extraction results
//!
//! Vision models are asked for bare JSON but frequently wrap it in a Markdown
//! code fence or surround it with prose. `coerce` strips that wrapping,
//! parses, and reports failures as [`CoercionFailure`] values rather than
//! errors: the caller is expected to substitute the safe default.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{ExtractionResult, PARSING_ERROR};
use crate::validate::validate;

/// Longest slice of raw model output quoted in failure messages
const MAX_QUOTED_LEN: usize = 200;

/// Model output that could not be turned into an `ExtractionResult`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionFailure {
    #[error("model returned an empty response")]
    Empty,

    #[error("no JSON object found in model response | Raw: {raw}")]
    NoJson { raw: String },

    #[error("invalid extraction JSON from model: {detail} | Raw: {raw}")]
    Malformed { detail: String, raw: String },
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```$")
            .unwrap_or_else(|e| panic!("code fence pattern is invalid: {}", e))
    })
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_QUOTED_LEN {
        let cut: String = text.chars().take(MAX_QUOTED_LEN).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Remove a Markdown code fence surrounding the whole response, if any
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    match fence_regex().captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str().trim()).unwrap_or(trimmed),
        None => trimmed,
    }
}

/// Parse raw model text into an extraction result
pub fn coerce(raw: &str) -> Result<ExtractionResult, CoercionFailure> {
    let response = strip_code_fence(raw);
    if response.is_empty() {
        return Err(CoercionFailure::Empty);
    }

    // Look for the outermost JSON object
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|err| CoercionFailure::Malformed {
                detail: err.to_string(),
                raw: truncate(json_str),
            })
        }
        _ => Err(CoercionFailure::NoJson {
            raw: truncate(response),
        }),
    }
}

/// Coerce a response the provider already returned as structured JSON
pub fn coerce_value(value: serde_json::Value) -> Result<ExtractionResult, CoercionFailure> {
    match value {
        serde_json::Value::String(text) => coerce(&text),
        value @ serde_json::Value::Object(_) => {
            let raw = truncate(&value.to_string());
            serde_json::from_value(value).map_err(|err| CoercionFailure::Malformed {
                detail: err.to_string(),
                raw,
            })
        }
        other => Err(CoercionFailure::NoJson {
            raw: truncate(&other.to_string()),
        }),
    }
}

/// Coerce and validate raw model text, falling back to the safe default
///
/// Never fails: unparseable output yields a "parsing error" default and a
/// result that breaks a schema rule yields a "processing error" default.
pub fn finalize(raw: &str) -> ExtractionResult {
    match coerce(raw) {
        Ok(result) => validate(result).into_result(),
        Err(failure) => {
            warn!(%failure, "Could not coerce model response");
            ExtractionResult::safe_default(PARSING_ERROR)
        }
    }
}

/// `finalize` for already-structured provider output
pub fn finalize_value(value: serde_json::Value) -> ExtractionResult {
    match coerce_value(value) {
        Ok(result) => validate(result).into_result(),
        Err(failure) => {
            debug!(%failure, "Could not coerce structured model response");
            ExtractionResult::safe_default(PARSING_ERROR)
        }
    }
}
