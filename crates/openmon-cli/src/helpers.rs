//! Shared CLI helpers — path expansion, target parsing, result printing.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;

use openmon_core::types::{CanonicalResult, ResultStatus, Target};
use openmon_core::utils::truncate_string;
use openmon_engine::metrics::ComparisonReport;
use openmon_engine::replay::CompareTarget;

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Split `provider/model`. Only the first slash separates, so aggregator
/// models like `openrouter/openai/gpt-4` keep their vendor prefix.
pub fn split_target(raw: &str) -> Result<(String, String)> {
    match raw.split_once('/') {
        Some((provider, model)) if !provider.trim().is_empty() && !model.trim().is_empty() => {
            Ok((provider.trim().to_string(), model.trim().to_string()))
        }
        _ => bail!("invalid target '{raw}', expected provider/model"),
    }
}

pub fn compare_target(raw: &str) -> Result<CompareTarget> {
    let (provider, model) = split_target(raw)?;
    Ok(CompareTarget {
        provider,
        model,
        parameters: None,
    })
}

pub fn parse_target(raw: &str) -> Result<Target> {
    let (provider, model) = split_target(raw)?;
    let provider = provider
        .parse()
        .with_context(|| format!("invalid target '{raw}'"))?;
    Ok(Target::new(provider, model))
}

/// Pretty-print any serializable value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn status_label(status: ResultStatus) -> String {
    match status {
        ResultStatus::Success => "✓ success".green().to_string(),
        ResultStatus::Error => "✗ error".red().to_string(),
        ResultStatus::Timeout => "⏱ timeout".yellow().to_string(),
        ResultStatus::RateLimited => "⏸ rate limited".yellow().to_string(),
    }
}

/// Print one result.
pub fn print_result(result: &CanonicalResult) {
    println!();
    println!(
        "{}  {}",
        result.target.to_string().cyan().bold(),
        status_label(result.status)
    );

    match &result.error {
        None => {
            if result.completion_text.is_empty() {
                println!("{}", "(no response)".dimmed());
            } else {
                println!("{}", result.completion_text);
            }
        }
        Some(err) => {
            let status = err
                .http_status
                .map(|s| format!(" (HTTP {s})"))
                .unwrap_or_default();
            println!("{} {}{}", err.code.to_string().red(), err.message, status);
        }
    }

    let usage = &result.token_usage;
    let estimated = match result.usage_source {
        openmon_core::types::UsageSource::Reported => "",
        openmon_core::types::UsageSource::Estimated => " (estimated)",
    };
    println!(
        "{}",
        format!(
            "{} ms | {} + {} tokens{} | ${:.4} | {} retries",
            result.latency_ms,
            usage.prompt_tokens(),
            usage.completion_tokens(),
            estimated,
            result.cost.total_cost,
            result.retry_attempts
        )
        .dimmed()
    );
}

/// Print a comparison: one block per target, then the rankings.
pub fn print_report(report: &ComparisonReport) {
    for result in &report.results {
        print_result(result);
    }

    println!();
    match &report.metrics {
        None => println!(
            "{}",
            "(rankings need at least two successful targets)".dimmed()
        ),
        Some(metrics) => {
            println!("{}", "Rankings".bold());
            let rows = [
                ("Fastest", &metrics.latency),
                ("Cheapest", &metrics.cost),
                ("Fewest tokens", &metrics.tokens),
                ("Longest reply", &metrics.response_length),
            ];
            for (label, entries) in rows {
                let order: Vec<String> = entries.iter().map(|e| e.config.clone()).collect();
                println!("  {:<16} {}", label, order.join(" > "));
            }
        }
    }
    println!();
}

/// Short preview of a prompt for one-line summaries.
pub fn preview(prompt: &str) -> String {
    truncate_string(prompt, 100)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
