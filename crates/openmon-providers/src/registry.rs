//! Provider registry — static specs for the four supported provider families.
//!
//! Each `ProviderSpec` describes how to reach one family: default endpoint,
//! auth scheme, built-in model list, pricing, probe path and wire quirks.
//! User settings are layered on top by [`crate::profile::ProviderProfile`].

use openmon_core::types::ProviderKind;

// ─────────────────────────────────────────────
// ProviderSpec — static metadata for one family
// ─────────────────────────────────────────────

/// How requests authenticate against a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`; an empty key fails fast.
    Bearer,
    /// No credentials (local runtimes).
    None,
}

/// Static per-model rate, USD per 1K tokens.
#[derive(Clone, Copy, Debug)]
pub struct PriceEntry {
    pub model: &'static str,
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

/// Static specification describing one provider family.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    /// Human-readable name for logs. E.g. `"OpenRouter"`.
    pub display_name: &'static str,
    pub default_api_base: &'static str,
    pub auth: AuthScheme,
    /// Generation timeout when the user sets none.
    pub default_timeout_secs: u64,
    /// Headers sent with every request (e.g. OpenRouter attribution).
    pub default_headers: &'static [(&'static str, &'static str)],
    /// Models accepted without extra configuration.
    pub default_models: &'static [&'static str],
    /// Empty for free (local) families.
    pub pricing: &'static [PriceEntry],
    /// Path, relative to the API base, listing available models.
    pub models_path: &'static str,
    /// Whether frequency/presence penalties are forwarded.
    pub supports_penalties: bool,
}

const fn price(model: &'static str, prompt_per_1k: f64, completion_per_1k: f64) -> PriceEntry {
    PriceEntry {
        model,
        prompt_per_1k,
        completion_per_1k,
    }
}

// ─────────────────────────────────────────────
// The four families
// ─────────────────────────────────────────────

/// Complete list of supported provider specifications.
pub static PROVIDERS: &[ProviderSpec] = &[
    // 1. OpenAI — hosted, bearer key
    ProviderSpec {
        kind: ProviderKind::HostedKey,
        display_name: "OpenAI",
        default_api_base: "https://api.openai.com/v1",
        auth: AuthScheme::Bearer,
        default_timeout_secs: 60,
        default_headers: &[],
        default_models: &[
            "gpt-4o",
            "gpt-4o-mini",
            "gpt-4",
            "gpt-4-32k",
            "gpt-4-turbo",
            "gpt-4-turbo-preview",
            "gpt-3.5-turbo",
            "gpt-3.5-turbo-16k",
        ],
        pricing: &[
            price("gpt-4o", 0.005, 0.015),
            price("gpt-4o-mini", 0.000_15, 0.0006),
            price("gpt-4", 0.03, 0.06),
            price("gpt-4-32k", 0.06, 0.12),
            price("gpt-4-turbo", 0.01, 0.03),
            price("gpt-4-turbo-preview", 0.01, 0.03),
            price("gpt-3.5-turbo", 0.0015, 0.002),
            price("gpt-3.5-turbo-16k", 0.003, 0.004),
            price("text-davinci-003", 0.02, 0.02),
        ],
        models_path: "/models",
        supports_penalties: true,
    },
    // 2. Ollama — local, free, no auth
    ProviderSpec {
        kind: ProviderKind::Local,
        display_name: "Ollama",
        default_api_base: "http://localhost:11434",
        auth: AuthScheme::None,
        default_timeout_secs: 120,
        default_headers: &[],
        default_models: &[
            "llama2",
            "llama3",
            "llama3.1",
            "mistral",
            "mixtral",
            "codellama",
            "phi3",
            "gemma",
            "qwen2",
        ],
        pricing: &[],
        models_path: "/api/tags",
        supports_penalties: true,
    },
    // 3. OpenRouter — aggregator, attribution headers
    ProviderSpec {
        kind: ProviderKind::Aggregator,
        display_name: "OpenRouter",
        default_api_base: "https://openrouter.ai/api/v1",
        auth: AuthScheme::Bearer,
        default_timeout_secs: 60,
        default_headers: &[
            ("HTTP-Referer", "https://github.com/openmon/openmon"),
            ("X-Title", "openmon"),
        ],
        default_models: &[
            "openai/gpt-4",
            "openai/gpt-3.5-turbo",
            "anthropic/claude-2",
            "meta-llama/llama-2-70b-chat",
            "mistralai/mistral-7b-instruct",
        ],
        pricing: &[
            price("openai/gpt-4", 0.03, 0.06),
            price("openai/gpt-3.5-turbo", 0.0015, 0.002),
            price("anthropic/claude-2", 0.008, 0.024),
            price("meta-llama/llama-2-70b-chat", 0.0007, 0.0009),
            price("mistralai/mistral-7b-instruct", 0.0002, 0.0002),
        ],
        models_path: "/models",
        supports_penalties: true,
    },
    // 4. Mistral — secondary hosted, no penalty parameters
    ProviderSpec {
        kind: ProviderKind::SecondaryHosted,
        display_name: "Mistral",
        default_api_base: "https://api.mistral.ai/v1",
        auth: AuthScheme::Bearer,
        default_timeout_secs: 60,
        default_headers: &[],
        default_models: &[
            "mistral-tiny",
            "mistral-small",
            "mistral-medium",
            "mistral-large-latest",
            "open-mistral-7b",
            "open-mixtral-8x7b",
            "open-mixtral-8x22b",
        ],
        pricing: &[
            price("mistral-tiny", 0.000_25, 0.000_25),
            price("mistral-small", 0.002, 0.006),
            price("mistral-medium", 0.0027, 0.0081),
            price("mistral-large", 0.008, 0.024),
        ],
        models_path: "/models",
        supports_penalties: false,
    },
];

// ─────────────────────────────────────────────
// Lookup
// ─────────────────────────────────────────────

/// Find the spec for a provider kind.
pub fn find_by_kind(kind: ProviderKind) -> &'static ProviderSpec {
    match kind {
        ProviderKind::HostedKey => &PROVIDERS[0],
        ProviderKind::Local => &PROVIDERS[1],
        ProviderKind::Aggregator => &PROVIDERS[2],
        ProviderKind::SecondaryHosted => &PROVIDERS[3],
    }
}

/// Find a provider spec by wire name (`"openai"`, `"local"`, …).
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    name.parse::<ProviderKind>().ok().map(find_by_kind)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
