//! Runtime configuration
//!
//! Config is resolved once at startup and passed explicitly to the server and
//! extractor; nothing reads the environment while handling a request.
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config tallyscan.toml`)
//! 3. Environment variables
//!
//! # Environment
//!
//! - `TALLYSCAN_PROVIDER`: `openai` (default), `anthropic` or `mock`
//! - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`
//! - `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL`, `ANTHROPIC_MODEL`
//! - `TALLYSCAN_MAX_UPLOAD_MB`: upload limit in megabytes (default: 10)
//! - `TALLYSCAN_TIMEOUT_SECS`: per-attempt model call timeout (default: 30)
//! - `TALLYSCAN_MAX_RETRIES`: retries after the first attempt (default: 2)
//! - `TALLYSCAN_PROMPTS_DIR`: prompt override directory

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::preprocess::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION};

/// Maximum file upload size (10 MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Image types accepted for upload
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub upload: UploadSettings,
    pub provider: ProviderConfig,
    pub image: ImageSettings,
    pub retry: RetrySettings,
    /// Prompt override directory (defaults to the platform data dir)
    pub prompts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub max_bytes: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadSettings {
    /// Whether an upload's content type is accepted (parameters ignored)
    pub fn allows(&self, mime_type: &str) -> bool {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&essence))
    }
}

/// Which hosted model API to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Anthropic,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai_compatible" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            other => Err(Error::Config(format!(
                "Unknown provider '{}'. Use: openai, anthropic, mock",
                other
            ))),
        }
    }
}

/// Connection settings for one hosted model API
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSettings {
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub openai: EndpointSettings,
    pub anthropic: EndpointSettings,
    /// Canned model reply for the mock provider
    pub mock_response: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            openai: EndpointSettings {
                base_url: "https://api.openai.com".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
            },
            anthropic: EndpointSettings {
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-3-5-haiku-latest".to_string(),
                api_key: None,
            },
            mock_response: None,
        }
    }
}

impl ProviderConfig {
    /// Settings for the selected provider (None for mock)
    pub fn active_endpoint(&self) -> Option<&EndpointSettings> {
        match self.kind {
            ProviderKind::OpenAI => Some(&self.openai),
            ProviderKind::Anthropic => Some(&self.anthropic),
            ProviderKind::Mock => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Per-attempt timeout
    pub timeout_secs: u64,
    /// Wait before the first retry; doubles on each subsequent retry
    pub initial_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            timeout_secs: 30,
            initial_backoff_ms: 500,
        }
    }
}

impl RetrySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

impl Config {
    /// Load defaults, then the TOML file if given, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(kind) = get("TALLYSCAN_PROVIDER") {
            match kind.parse() {
                Ok(kind) => self.provider.kind = kind,
                Err(e) => warn!("{}, keeping {}", e, self.provider.kind),
            }
        }

        if let Some(key) = get("OPENAI_API_KEY") {
            self.provider.openai.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.provider.openai.base_url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.provider.openai.model = model;
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.provider.anthropic.api_key = Some(key);
        }
        if let Some(url) = get("ANTHROPIC_BASE_URL") {
            self.provider.anthropic.base_url = url;
        }
        if let Some(model) = get("ANTHROPIC_MODEL") {
            self.provider.anthropic.model = model;
        }

        if let Some(mb) = get("TALLYSCAN_MAX_UPLOAD_MB") {
            match mb
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|mb| mb.checked_mul(1024 * 1024))
            {
                Some(bytes) => self.upload.max_bytes = bytes,
                None => warn!(value = %mb, "Invalid TALLYSCAN_MAX_UPLOAD_MB, ignoring"),
            }
        }
        if let Some(secs) = get("TALLYSCAN_TIMEOUT_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.retry.timeout_secs = secs,
                Err(_) => warn!(value = %secs, "Invalid TALLYSCAN_TIMEOUT_SECS, ignoring"),
            }
        }
        if let Some(retries) = get("TALLYSCAN_MAX_RETRIES") {
            match retries.trim().parse() {
                Ok(retries) => self.retry.max_retries = retries,
                Err(_) => warn!(value = %retries, "Invalid TALLYSCAN_MAX_RETRIES, ignoring"),
            }
        }
        if let Some(dir) = get("TALLYSCAN_PROMPTS_DIR") {
            self.prompts_dir = Some(PathBuf::from(dir));
        }
    }

    /// Check the configuration is usable for serving requests
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = self.provider.active_endpoint() {
            if endpoint.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                let var = match self.provider.kind {
                    ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
                    _ => "OPENAI_API_KEY",
                };
                return Err(Error::Config(format!(
                    "No API key for provider '{}'. Set {}.",
                    self.provider.kind, var
                )));
            }
            if endpoint.model.trim().is_empty() {
                return Err(Error::Config(format!(
                    "No model configured for provider '{}'",
                    self.provider.kind
                )));
            }
        }
        if self.upload.max_bytes == 0 {
            return Err(Error::Config("upload.max_bytes must be positive".into()));
        }
        if self.retry.timeout_secs == 0 {
            return Err(Error::Config("retry.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Prompt override directory, falling back to the platform default
    pub fn prompts_dir(&self) -> Option<PathBuf> {
        self.prompts_dir
            .clone()
            .or_else(crate::prompts::default_prompts_dir)
    }
}
