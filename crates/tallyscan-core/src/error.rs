//! Error types for Tallyscan
//!
//! `Error` covers failures that cannot be recovered inside the core: broken
//! uploads, upstream model failures, bad configuration. Problems with the
//! model's *output* are not errors here; see [`crate::validate::SchemaViolation`]
//! and [`crate::coerce::CoercionFailure`], which are always recovered by
//! substituting the safe default.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Upstream model error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream model call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Whether this error came from the hosted model call rather than from
    /// local processing
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Upstream { .. }
                | Error::Timeout { .. }
                | Error::MalformedResponse(_)
        )
    }

    /// Whether another attempt at the same upstream call might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageProcessing(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
