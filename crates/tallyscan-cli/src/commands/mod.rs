//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `extract` - Run the extraction pipeline on a local image
//! - `prompt` - Show the active extraction prompt
//! - `serve` - Web server command
//! - `validate` - Check a stored model response

pub mod extract;
pub mod prompt;
pub mod serve;
pub mod validate;

// Re-export command functions for main.rs
pub use extract::*;
pub use prompt::*;
pub use serve::*;
pub use validate::*;
