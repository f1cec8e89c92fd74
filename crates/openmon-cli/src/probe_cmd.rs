//! `openmon probe` and `openmon models`.

use anyhow::{anyhow, Result};
use colored::Colorize;

use openmon_core::types::ProviderKind;
use openmon_engine::replay::ReplayEngine;
use openmon_providers::prober::{ProbeCredentials, ProbeReport};

use crate::helpers;

pub async fn probe(
    engine: &ReplayEngine,
    provider: Option<&str>,
    api_key: Option<String>,
    api_base: Option<String>,
    json: bool,
) -> Result<()> {
    let reports = match provider {
        Some(name) => {
            let kind: ProviderKind = name.parse()?;
            let credentials = (api_key.is_some() || api_base.is_some())
                .then_some(ProbeCredentials { api_key, api_base });
            vec![engine.probe(kind, credentials.as_ref()).await]
        }
        None => engine.probe_all().await,
    };

    if json {
        return helpers::print_json(&reports);
    }

    println!();
    for report in &reports {
        print_report(report);
    }
    println!();
    Ok(())
}

fn print_report(report: &ProbeReport) {
    let mark = if report.connected {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "  {} {:<18} {:>6} ms  {} models  {}",
        mark,
        report.provider.family(),
        report.latency_ms,
        report.models_found,
        report.status_detail.dimmed()
    );
}

pub async fn models(engine: &ReplayEngine, provider: &str, json: bool) -> Result<()> {
    let kind: ProviderKind = provider.parse()?;
    let models = engine
        .list_models(kind)
        .await
        .map_err(|e| anyhow!("failed to list {} models: {e}", kind.family()))?;

    if json {
        return helpers::print_json(&models);
    }

    println!();
    println!("{}", format!("{} models", kind.family()).cyan().bold());
    if models.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for model in &models {
        println!("  {model}");
    }
    println!();
    Ok(())
}
