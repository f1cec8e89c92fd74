//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProvidersConfig`, `RetryConfig`, `DispatchConfig`,
//! `ProbeConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::ProviderKind;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.openmon/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub retry: RetryConfig,
    pub dispatch: DispatchConfig,
    pub probe: ProbeConfig,
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Credentials and endpoint settings for one provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// API key for bearer authentication. Unused by the local provider.
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
    /// Models accepted in addition to the provider's built-in list.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
    /// Generation timeout override, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    pub enabled: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            extra_headers: None,
            models: Vec::new(),
            timeout_secs: None,
            enabled: true,
        }
    }
}

impl ProviderSettings {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Settings for every supported provider family.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub openai: ProviderSettings,
    pub ollama: ProviderSettings,
    pub openrouter: ProviderSettings,
    pub mistral: ProviderSettings,
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::HostedKey => &self.openai,
            ProviderKind::Local => &self.ollama,
            ProviderKind::Aggregator => &self.openrouter,
            ProviderKind::SecondaryHosted => &self.mistral,
        }
    }

    pub fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::HostedKey => &mut self.openai,
            ProviderKind::Local => &mut self.ollama,
            ProviderKind::Aggregator => &mut self.openrouter,
            ProviderKind::SecondaryHosted => &mut self.mistral,
        }
    }
}

// ─────────────────────────────────────────────
// Retry
// ─────────────────────────────────────────────

/// Retry/backoff settings for one provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Values below 1.0 are treated as 1.0.
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    fn with(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier: 2.0,
        }
    }
}

/// Retry settings per provider family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    pub openai: RetrySettings,
    pub ollama: RetrySettings,
    pub openrouter: RetrySettings,
    pub mistral: RetrySettings,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            openai: RetrySettings::with(3, 1000, 30_000),
            ollama: RetrySettings::with(2, 500, 10_000),
            openrouter: RetrySettings::with(2, 2000, 20_000),
            mistral: RetrySettings::with(3, 1500, 25_000),
        }
    }
}

impl RetryConfig {
    pub fn for_provider(&self, kind: ProviderKind) -> &RetrySettings {
        match kind {
            ProviderKind::HostedKey => &self.openai,
            ProviderKind::Local => &self.ollama,
            ProviderKind::Aggregator => &self.openrouter,
            ProviderKind::SecondaryHosted => &self.mistral,
        }
    }

    pub fn for_provider_mut(&mut self, kind: ProviderKind) -> &mut RetrySettings {
        match kind {
            ProviderKind::HostedKey => &mut self.openai,
            ProviderKind::Local => &mut self.ollama,
            ProviderKind::Aggregator => &mut self.openrouter,
            ProviderKind::SecondaryHosted => &mut self.mistral,
        }
    }

    /// Same settings for every provider.
    pub fn uniform(settings: RetrySettings) -> Self {
        Self {
            openai: settings.clone(),
            ollama: settings.clone(),
            openrouter: settings.clone(),
            mistral: settings,
        }
    }
}

// ─────────────────────────────────────────────
// Dispatch & probe
// ─────────────────────────────────────────────

/// Comparison batch limits and estimator defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchConfig {
    /// Maximum targets in one comparison.
    pub max_comparison_targets: usize,
    /// Expected completion length (characters) when `maxTokens` is unset.
    pub default_completion_chars: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_comparison_targets: 5,
            default_completion_chars: 100,
        }
    }
}

/// Connection prober settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeConfig {
    /// Fixed probe timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
