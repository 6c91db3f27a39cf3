//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tallyscan - Turn receipt photos into structured data
#[derive(Parser)]
#[command(name = "tallyscan")]
#[command(about = "Receipt image extraction with validated results", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (TOML). Environment variables override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on (defaults to the config file value, then 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to the config file value, then 127.0.0.1)
        #[arg(long)]
        host: Option<String>,
    },

    /// Extract a receipt image and print the result as JSON
    Extract {
        /// Receipt image (JPEG, PNG, WebP or GIF)
        image: PathBuf,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Coerce and validate a stored model response
    ///
    /// Exits with a non-zero status when the response would be replaced by
    /// the safe default.
    Validate {
        /// File holding the raw model response
        file: PathBuf,
    },

    /// Show the active extraction prompt and where it was loaded from
    Prompt,
}
