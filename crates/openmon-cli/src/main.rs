//! openmon CLI — entry point.
//!
//! # Commands
//!
//! - `openmon replay -p PROVIDER -m MODEL PROMPT` — replay one prompt
//! - `openmon compare -t PROVIDER/MODEL ... PROMPT` — side-by-side comparison
//! - `openmon estimate -p PROVIDER -m MODEL PROMPT` — pre-flight token/cost estimate
//! - `openmon costs -t PROVIDER/MODEL ...` — price a nominal token count across models
//! - `openmon probe [PROVIDER]` — connectivity and auth checks
//! - `openmon models PROVIDER` — list the provider's models
//! - `openmon init` — write a default config file
//! - `openmon status` — show configuration and provider status

mod helpers;
mod onboard;
mod probe_cmd;
mod replay_cmd;
mod status;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use openmon_core::config::{load_config, Config};
use openmon_engine::replay::EstimateInput;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// openmon — replay and compare prompts across LLM providers
#[derive(Parser)]
#[command(name = "openmon", version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.openmon/config.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print machine-readable JSON instead of formatted output
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Sampling parameters shared by `replay` and `compare`.
#[derive(Args, Clone, Debug, Default)]
pub struct ParamArgs {
    /// Sampling temperature (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Completion token cap
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling (0.0 - 1.0)
    #[arg(long)]
    pub top_p: Option<f64>,

    #[arg(long)]
    pub frequency_penalty: Option<f64>,

    #[arg(long)]
    pub presence_penalty: Option<f64>,

    /// Stop sequence (repeatable)
    #[arg(long)]
    pub stop: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a prompt against one provider/model
    Replay {
        /// Provider (openai, ollama, openrouter, mistral)
        #[arg(short, long)]
        provider: String,

        #[arg(short, long)]
        model: String,

        /// System message
        #[arg(short, long)]
        system: Option<String>,

        /// Deliver the completion as stream events
        #[arg(long, default_value_t = false)]
        stream: bool,

        #[command(flatten)]
        params: ParamArgs,

        prompt: String,
    },

    /// Run one prompt against several targets concurrently
    Compare {
        /// Target as provider/model (repeatable)
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,

        #[arg(short, long)]
        system: Option<String>,

        #[command(flatten)]
        params: ParamArgs,

        prompt: String,
    },

    /// Estimate tokens and cost without calling the provider
    Estimate {
        #[arg(short, long)]
        provider: String,

        #[arg(short, long)]
        model: String,

        #[arg(short, long)]
        system: Option<String>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Expected completion length in characters, when --max-tokens is unset
        #[arg(long)]
        completion_chars: Option<u32>,

        prompt: String,
    },

    /// Rank targets by the cost of a nominal token count
    Costs {
        /// Target as provider/model (repeatable)
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,

        /// Tokens, split evenly between prompt and completion
        #[arg(long, default_value_t = 1000)]
        tokens: u32,
    },

    /// Check connectivity and authentication
    Probe {
        /// Provider to probe. Omit to probe every enabled provider.
        provider: Option<String>,

        /// API key to try instead of the configured one
        #[arg(long)]
        api_key: Option<String>,

        /// API base to try instead of the configured one
        #[arg(long)]
        api_base: Option<String>,
    },

    /// List the models a provider serves
    Models { provider: String },

    /// Write a default config file
    Init,

    /// Show configuration and provider status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.logs);

    let config_path = cli.config.as_deref().map(helpers::expand_tilde);
    let json = cli.json;

    match cli.command {
        Commands::Init => onboard::run(config_path.as_deref()),
        Commands::Status => status::run(config_path.as_deref(), json),
        command => {
            let config = load(config_path);
            run_engine_command(command, &config, json).await
        }
    }
}

async fn run_engine_command(command: Commands, config: &Config, json: bool) -> Result<()> {
    let engine = openmon_engine::ReplayEngine::from_config(config);

    match command {
        Commands::Replay {
            provider,
            model,
            system,
            stream,
            params,
            prompt,
        } => {
            let input = replay_cmd::replay_input(provider, model, system, &params, prompt);
            if stream {
                replay_cmd::stream(&engine, input, json).await
            } else {
                replay_cmd::replay(&engine, input, json).await
            }
        }
        Commands::Compare {
            targets,
            system,
            params,
            prompt,
        } => replay_cmd::compare(&engine, &targets, system, &params, prompt, json).await,
        Commands::Estimate {
            provider,
            model,
            system,
            max_tokens,
            completion_chars,
            prompt,
        } => {
            let input = EstimateInput {
                provider,
                model,
                prompt,
                system_message: system,
                max_tokens,
                estimated_completion_length: completion_chars,
            };
            replay_cmd::estimate(&engine, &input, json).await
        }
        Commands::Costs { targets, tokens } => {
            replay_cmd::costs(&engine, &targets, tokens, json).await
        }
        Commands::Probe {
            provider,
            api_key,
            api_base,
        } => probe_cmd::probe(&engine, provider.as_deref(), api_key, api_base, json).await,
        Commands::Models { provider } => probe_cmd::models(&engine, &provider, json).await,
        Commands::Init | Commands::Status => Ok(()),
    }
}

fn load(path: Option<PathBuf>) -> Config {
    load_config(path.as_deref())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("openmon=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
