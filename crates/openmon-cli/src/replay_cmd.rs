//! `openmon replay | compare | estimate | costs`.

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::sync::mpsc;

use openmon_engine::replay::{
    CompareInput, EstimateInput, ParamOverrides, ReplayEngine, ReplayEvent, ReplayInput,
};

use crate::helpers;
use crate::ParamArgs;

fn overrides(params: &ParamArgs) -> ParamOverrides {
    ParamOverrides {
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        top_p: params.top_p,
        frequency_penalty: params.frequency_penalty,
        presence_penalty: params.presence_penalty,
        stop: (!params.stop.is_empty()).then(|| params.stop.clone()),
    }
}

pub fn replay_input(
    provider: String,
    model: String,
    system: Option<String>,
    params: &ParamArgs,
    prompt: String,
) -> ReplayInput {
    ReplayInput {
        provider,
        model,
        prompt,
        system_message: system,
        parameters: overrides(params),
        ..Default::default()
    }
}

pub async fn replay(engine: &ReplayEngine, input: ReplayInput, json: bool) -> Result<()> {
    let result = engine.replay(&input).await.context("replay rejected")?;
    if json {
        return helpers::print_json(&result);
    }
    helpers::print_result(&result);
    println!();
    Ok(())
}

pub async fn stream(engine: &ReplayEngine, input: ReplayInput, json: bool) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(16);

    let printer = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            if json {
                events.push(event);
                continue;
            }
            match &event {
                ReplayEvent::Chunk { content } => print!("{content}"),
                ReplayEvent::Complete { result } => {
                    println!();
                    println!(
                        "{}",
                        format!(
                            "{} | {} ms | ${:.4}",
                            result.target, result.latency_ms, result.cost.total_cost
                        )
                        .dimmed()
                    );
                }
                ReplayEvent::Failed { error, .. } => {
                    eprintln!("{} {}", error.code.to_string().red(), error.message);
                }
            }
        }
        events
    });

    let outcome = engine.stream_replay(&input, tx).await;
    let events = printer.await.context("stream printer failed")?;
    outcome.context("replay rejected")?;

    if json {
        helpers::print_json(&events)?;
    }
    Ok(())
}

pub async fn compare(
    engine: &ReplayEngine,
    targets: &[String],
    system: Option<String>,
    params: &ParamArgs,
    prompt: String,
    json: bool,
) -> Result<()> {
    let providers = targets
        .iter()
        .map(|t| helpers::compare_target(t))
        .collect::<Result<Vec<_>>>()?;
    let input = CompareInput {
        prompt,
        system_message: system,
        providers,
        parameters: overrides(params),
    };

    let report = engine.compare(&input).await.context("comparison rejected")?;
    if json {
        return helpers::print_json(&report);
    }
    println!();
    println!(
        "{} {}",
        "Comparing:".bold(),
        helpers::preview(&report.prompt).dimmed()
    );
    helpers::print_report(&report);
    Ok(())
}

pub async fn estimate(engine: &ReplayEngine, input: &EstimateInput, json: bool) -> Result<()> {
    let estimate = engine.estimate(input).await.context("estimate rejected")?;
    if json {
        return helpers::print_json(&estimate);
    }

    println!();
    println!("{}", format!("{}/{}", estimate.provider, estimate.model).cyan().bold());
    println!("  {:<22} {}", "Prompt tokens:".bold(), estimate.prompt_tokens);
    println!(
        "  {:<22} {}",
        "Max completion tokens:".bold(),
        estimate.max_completion_tokens
    );
    let cost = &estimate.estimated_cost;
    println!(
        "  {:<22} ${:.4} (prompt ${:.4} + completion ${:.4})",
        "Estimated cost:".bold(),
        cost.total_cost,
        cost.prompt_cost,
        cost.completion_cost
    );
    if !estimate.priced {
        println!("  {}", "no pricing known for this model".yellow());
    }
    println!();
    Ok(())
}

pub async fn costs(engine: &ReplayEngine, targets: &[String], tokens: u32, json: bool) -> Result<()> {
    let targets = targets
        .iter()
        .map(|t| helpers::parse_target(t))
        .collect::<Result<Vec<_>>>()?;
    let ranking = engine.compare_costs(&targets, tokens).await;
    if json {
        return helpers::print_json(&ranking);
    }

    println!();
    println!("{}", format!("Cost of {tokens} tokens").bold());
    for (rank, entry) in ranking.iter().enumerate() {
        println!(
            "  {}. {:<36} ${:.4}",
            rank + 1,
            format!("{}/{}", entry.provider, entry.model),
            entry.cost
        );
    }
    println!();
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
