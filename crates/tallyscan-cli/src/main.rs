//! Tallyscan CLI - Receipt photo to structured data
//!
//! Usage:
//!   tallyscan serve --port 3000        Start web server
//!   tallyscan extract receipt.jpg      Extract one image and print JSON
//!   tallyscan validate response.txt    Check a stored model response
//!   tallyscan prompt                   Show the active prompt

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use tallyscan_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve { port, host } => commands::cmd_serve(config, host, port).await,
        Commands::Extract { image, pretty } => commands::cmd_extract(&config, &image, pretty).await,
        Commands::Validate { file } => commands::cmd_validate(&file),
        Commands::Prompt => commands::cmd_prompt(&config),
    }
}
