//! Prompt command implementation

use anyhow::{Context, Result};
use tallyscan_core::{prompts::PROMPT_FILE, Config, Prompt};

/// Show the active extraction prompt and its source
pub fn cmd_prompt(config: &Config) -> Result<()> {
    let prompts_dir = config.prompts_dir();
    let prompt = Prompt::load(prompts_dir.as_deref()).context("Failed to load prompt")?;

    println!("Prompt: {}", prompt.metadata.id);
    println!("Version: {}", prompt.metadata.version);
    println!(
        "Source: {}",
        if prompt.is_override() {
            "Override"
        } else {
            "Default"
        }
    );

    match (&prompt.override_path, &prompts_dir) {
        (Some(path), _) => println!("Override Path: {}", path.display()),
        (None, Some(dir)) => println!(
            "To customize, copy it to: {}",
            dir.join(PROMPT_FILE).display()
        ),
        (None, None) => {}
    }

    println!();
    println!("--- System ---");
    println!("{}", prompt.system());
    println!();
    println!("--- User ---");
    println!("{}", prompt.user());

    Ok(())
}
