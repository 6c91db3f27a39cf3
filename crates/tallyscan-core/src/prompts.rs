//! Extraction prompt loading
//!
//! The prompt is loaded with a two-layer resolution:
//! 1. Check for an override in the prompts dir (~/.local/share/tallyscan/prompts/)
//! 2. Fall back to the embedded default (compiled into binary)
//!
//! This allows users to tune the prompt for their receipts without modifying
//! the source, while automatically getting the new default on upgrade.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};

/// Embedded default prompt (compiled into binary)
const EXTRACT_RECEIPT: &str = include_str!("../../../prompts/extract_receipt.md");

/// File name looked up in the override directory
pub const PROMPT_FILE: &str = "extract_receipt.md";

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Metadata from frontmatter
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Path to the override file, if this didn't come from the embedded default
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// The embedded default prompt
    pub fn embedded() -> Result<Self> {
        let (metadata, content) = parse_prompt(EXTRACT_RECEIPT)?;
        Ok(Self {
            metadata,
            content,
            override_path: None,
        })
    }

    /// Load the override from `override_dir` if one exists, else the embedded default
    pub fn load(override_dir: Option<&Path>) -> Result<Self> {
        if let Some(dir) = override_dir {
            let path = dir.join(PROMPT_FILE);
            if path.exists() {
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::InvalidData(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                info!(
                    path = %path.display(),
                    version = metadata.version,
                    "Using prompt override"
                );
                return Ok(Self {
                    metadata,
                    content: body,
                    override_path: Some(path),
                });
            }
        }

        Self::embedded()
    }

    pub fn is_override(&self) -> bool {
        self.override_path.is_some()
    }

    /// System instruction sent alongside the image
    pub fn system(&self) -> &str {
        extract_section(&self.content, "# System").unwrap_or("")
    }

    /// User instruction sent with the image; the whole body when there are no sections
    pub fn user(&self) -> &str {
        extract_section(&self.content, "# User").unwrap_or(self.content.as_str())
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tallyscan").join("prompts"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    // Headers only count at the start of a line
    let start = if content.starts_with(header) {
        0
    } else {
        content.find(&format!("\n{}", header))? + 1
    };
    let after_header = &content[start + header.len()..];

    // Find the next header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}
