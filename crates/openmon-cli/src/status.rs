//! `openmon status` — show configuration and provider status.
//!
//! - Shows config path and whether it exists
//! - Shows key status, base URL and retry policy for each provider

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use openmon_core::config::{get_config_path, load_config};
use openmon_core::types::ProviderKind;
use openmon_core::utils::mask_secret;
use openmon_providers::profile::ProfileSet;

use crate::helpers;

/// Run the status command.
pub fn run(path: Option<&Path>, as_json: bool) -> Result<()> {
    let config = load_config(path);
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);
    let profiles = ProfileSet::from_config(&config.providers);

    if as_json {
        let providers: Vec<_> = profiles
            .iter()
            .map(|p| {
                json!({
                    "provider": p.kind,
                    "enabled": p.enabled,
                    "apiBase": p.api_base,
                    "credential": !p.missing_credential(),
                    "models": p.supported_models.len(),
                    "retry": config.retry.for_provider(p.kind),
                })
            })
            .collect();
        return helpers::print_json(&json!({
            "config": config_path,
            "configExists": config_path.exists(),
            "dispatch": config.dispatch,
            "probe": config.probe,
            "providers": providers,
        }));
    }

    println!();
    println!("{}", "openmon status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );
    println!(
        "  {:<18} max {} targets | probe timeout {}s",
        "Dispatch:".bold(),
        config.dispatch.max_comparison_targets,
        config.probe.timeout_secs
    );

    println!();
    println!("  {}", "Providers:".bold());
    for kind in ProviderKind::ALL {
        let Some(profile) = profiles.get(kind) else {
            continue;
        };
        let credential = if !profile.enabled {
            format!("{}", "· disabled".dimmed())
        } else if kind.is_local() {
            format!("{} (no key needed)", "✓".green())
        } else if profile.missing_credential() {
            format!("{}", "· no API key".dimmed())
        } else {
            format!("{} ({})", "✓".green(), mask_secret(profile.api_key()))
        };
        let retry = config.retry.for_provider(kind);
        println!(
            "    {:<20} {} {}",
            profile.display_name,
            credential,
            format!(
                "{} | {} retries, {}ms base",
                profile.api_base, retry.max_retries, retry.base_delay_ms
            )
            .dimmed()
        );
    }
    println!();

    Ok(())
}
