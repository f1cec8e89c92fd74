//! `openmon init` — write a default configuration file.
//!
//! Creates `~/.openmon/config.json` (or the `--config` path) with every
//! section filled in, so users only have to paste their API keys.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use openmon_core::config::{get_config_path, save_config, Config};

/// Run the init command.
pub fn run(path: Option<&Path>) -> Result<()> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

    println!();
    println!("{}", "openmon — setup".cyan().bold());
    println!();

    if write_default_config(&config_path)? {
        println!(
            "  {} created config at {}",
            "✓".green(),
            config_path.display()
        );
    } else {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    }

    println!();
    println!(
        "{}",
        "Next: add API keys under providers.openai / openrouter / mistral,".dimmed()
    );
    println!(
        "{}",
        "or export OPENAI_API_KEY, OPENROUTER_API_KEY, MISTRAL_API_KEY.".dimmed()
    );
    println!("{}", "Then run `openmon probe`.".dimmed());
    println!();
    Ok(())
}

/// Write the default config unless a file already exists. Returns whether
/// a file was written.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(path))
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    Ok(true)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
