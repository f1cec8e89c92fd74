//! Provider profiles — a static [`ProviderSpec`] merged with user settings.
//!
//! A profile is the complete, read-only description an adapter needs to
//! reach one provider: endpoint, credential, headers, pricing, timeout and
//! accepted models. Profiles are built once from config and shared.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use openmon_core::config::{ProviderSettings, ProvidersConfig};
use openmon_core::types::ProviderKind;

use crate::registry::{find_by_kind, AuthScheme, ProviderSpec};

// ─────────────────────────────────────────────
// Pricing
// ─────────────────────────────────────────────

/// Rate for one model, USD per 1K tokens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelRate {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl ModelRate {
    pub fn new(prompt_per_1k: f64, completion_per_1k: f64) -> Self {
        Self {
            prompt_per_1k,
            completion_per_1k,
        }
    }
}

/// Per-model rates for a metered provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PricingTable {
    rates: Vec<(String, ModelRate)>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the rate for `model`.
    pub fn with_rate(mut self, model: impl Into<String>, rate: ModelRate) -> Self {
        let model = model.into();
        self.rates.retain(|(m, _)| *m != model);
        self.rates.push((model, rate));
        self
    }

    /// Look up the rate for a model.
    ///
    /// Exact match first; then the longest table key contained in the model
    /// name (`gpt-4-0613` → `gpt-4`); then a table key containing the model
    /// name. Comparisons after the exact match ignore case.
    pub fn rate_for(&self, model: &str) -> Option<ModelRate> {
        if let Some((_, rate)) = self.rates.iter().find(|(m, _)| m == model) {
            return Some(*rate);
        }

        let model_lower = model.to_lowercase();
        if model_lower.is_empty() {
            return None;
        }

        self.rates
            .iter()
            .filter(|(m, _)| model_lower.contains(&m.to_lowercase()))
            .max_by_key(|(m, _)| m.len())
            .or_else(|| {
                self.rates
                    .iter()
                    .find(|(m, _)| m.to_lowercase().contains(&model_lower))
            })
            .map(|(_, rate)| *rate)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// How a provider charges. Local runtimes are `Free` by construction; no
/// rate table can make them cost money.
#[derive(Clone, Debug, PartialEq)]
pub enum Pricing {
    Free,
    Metered(PricingTable),
}

impl Pricing {
    /// Rate for a model; `Free` always yields a zero rate.
    pub fn rate_for(&self, model: &str) -> Option<ModelRate> {
        match self {
            Pricing::Free => Some(ModelRate::new(0.0, 0.0)),
            Pricing::Metered(table) => table.rate_for(model),
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Pricing::Free)
    }

    fn from_spec(spec: &ProviderSpec) -> Self {
        if spec.kind.is_local() {
            return Pricing::Free;
        }
        let table = spec.pricing.iter().fold(PricingTable::new(), |table, p| {
            table.with_rate(p.model, ModelRate::new(p.prompt_per_1k, p.completion_per_1k))
        });
        Pricing::Metered(table)
    }
}

// ─────────────────────────────────────────────
// ProviderProfile
// ─────────────────────────────────────────────

/// Everything needed to call one provider.
#[derive(Clone)]
pub struct ProviderProfile {
    pub kind: ProviderKind,
    pub display_name: String,
    pub api_base: String,
    api_key: String,
    pub auth: AuthScheme,
    pub headers: HeaderMap,
    pub pricing: Pricing,
    pub default_timeout: Duration,
    pub supported_models: Vec<String>,
    pub models_path: String,
    pub supports_penalties: bool,
    pub enabled: bool,
}

impl fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("kind", &self.kind)
            .field("api_base", &self.api_base)
            .field("api_key", &openmon_core::utils::mask_secret(&self.api_key))
            .field("default_timeout", &self.default_timeout)
            .field("models", &self.supported_models.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ProviderProfile {
    /// Build a profile from a spec plus user settings.
    ///
    /// Settings override the spec's endpoint and timeout; configured models
    /// extend the spec's built-in list.
    pub fn from_spec(spec: &ProviderSpec, settings: &ProviderSettings) -> Self {
        let api_base = settings
            .api_base
            .clone()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| spec.default_api_base.to_string());

        let mut headers = HeaderMap::new();
        for (key, value) in spec.default_headers {
            insert_header(&mut headers, key, value);
        }
        if let Some(ref extra) = settings.extra_headers {
            for (key, value) in extra {
                insert_header(&mut headers, key, value);
            }
        }

        let mut supported_models: Vec<String> =
            spec.default_models.iter().map(|m| m.to_string()).collect();
        for model in &settings.models {
            if !supported_models.contains(model) {
                supported_models.push(model.clone());
            }
        }

        let timeout_secs = settings
            .timeout_secs
            .filter(|t| *t > 0)
            .unwrap_or(spec.default_timeout_secs);

        ProviderProfile {
            kind: spec.kind,
            display_name: spec.display_name.to_string(),
            api_base,
            api_key: settings.api_key.clone(),
            auth: spec.auth,
            headers,
            pricing: Pricing::from_spec(spec),
            default_timeout: Duration::from_secs(timeout_secs),
            supported_models,
            models_path: spec.models_path.to_string(),
            supports_penalties: spec.supports_penalties,
            enabled: settings.enabled,
        }
    }

    /// Build the profile for `kind` from user settings.
    pub fn for_kind(kind: ProviderKind, settings: &ProviderSettings) -> Self {
        Self::from_spec(find_by_kind(kind), settings)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Add models to the accepted list, skipping ones already present
    /// (case-insensitive). The defaults stay.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for model in models {
            let model = model.into();
            if !self
                .supported_models
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&model))
            {
                self.supported_models.push(model);
            }
        }
        self
    }

    /// Replace the pricing table. Ignored for local providers, which stay free.
    pub fn with_pricing(mut self, table: PricingTable) -> Self {
        if self.kind.is_local() {
            warn!(provider = %self.kind, "Ignoring pricing table for a local provider");
            return self;
        }
        self.pricing = Pricing::Metered(table);
        self
    }

    /// Whether the provider needs a credential and none is configured.
    pub fn missing_credential(&self) -> bool {
        self.auth == AuthScheme::Bearer && self.api_key.trim().is_empty()
    }

    /// Whether `model` is accepted by this profile.
    ///
    /// Matching ignores case; a tagged local model (`llama2:13b`) matches its
    /// base name.
    pub fn supports_model(&self, model: &str) -> bool {
        let matches = |candidate: &str| {
            self.supported_models
                .iter()
                .any(|m| m.eq_ignore_ascii_case(candidate))
        };
        if matches(model) {
            return true;
        }
        match model.split_once(':') {
            Some((base, _)) if self.kind.is_local() => matches(base),
            _ => false,
        }
    }

    /// Join the API base with a path, tolerating trailing slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn insert_header(headers: &mut HeaderMap, key: &str, value: &str) {
    match (
        HeaderName::from_bytes(key.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(val)) => {
            headers.insert(name, val);
        }
        _ => warn!("Invalid header: {}={}", key, value),
    }
}

// ─────────────────────────────────────────────
// ProfileSet
// ─────────────────────────────────────────────

/// One profile per provider kind, built from config.
#[derive(Clone, Debug, Default)]
pub struct ProfileSet {
    profiles: HashMap<ProviderKind, ProviderProfile>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build profiles for every provider family.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let profiles = ProviderKind::ALL
            .iter()
            .map(|kind| (*kind, ProviderProfile::for_kind(*kind, config.get(*kind))))
            .collect();
        Self { profiles }
    }

    pub fn insert(&mut self, profile: ProviderProfile) {
        self.profiles.insert(profile.kind, profile);
    }

    pub fn with_profile(mut self, profile: ProviderProfile) -> Self {
        self.insert(profile);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderProfile> {
        self.profiles.get(&kind)
    }

    /// Profiles in stable `ProviderKind` order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderProfile> {
        ProviderKind::ALL
            .iter()
            .filter_map(move |kind| self.profiles.get(kind))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: &str, api_base: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            api_key: api_key.to_string(),
            api_base: api_base.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_api_base_used_when_unset() {
        let profile = ProviderProfile::for_kind(ProviderKind::Aggregator, &settings("sk-or", None));
        assert_eq!(profile.api_base, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_config_overrides_default_base() {
        let profile = ProviderProfile::for_kind(
            ProviderKind::Aggregator,
            &settings("sk-or", Some("https://custom.proxy.com/v1")),
        );
        assert_eq!(profile.api_base, "https://custom.proxy.com/v1");
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let profile = ProviderProfile::for_kind(
            ProviderKind::HostedKey,
            &settings("key", Some("https://api.openai.com/v1/")),
        );
        assert_eq!(
            profile.endpoint("/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_local_profile_is_always_free() {
        let profile = ProviderProfile::for_kind(ProviderKind::Local, &ProviderSettings::default())
            .with_pricing(PricingTable::new().with_rate("llama2", ModelRate::new(1.0, 1.0)));
        assert!(profile.pricing.is_free());
        assert_eq!(profile.pricing.rate_for("llama2"), Some(ModelRate::new(0.0, 0.0)));
    }

    #[test]
    fn test_pricing_exact_then_containment() {
        let table = PricingTable::new()
            .with_rate("gpt-4", ModelRate::new(0.03, 0.06))
            .with_rate("gpt-4-turbo", ModelRate::new(0.01, 0.03));

        assert_eq!(table.rate_for("gpt-4"), Some(ModelRate::new(0.03, 0.06)));
        // Longest contained key wins
        assert_eq!(
            table.rate_for("GPT-4-Turbo-2024-04-09"),
            Some(ModelRate::new(0.01, 0.03))
        );
        assert_eq!(table.rate_for("gpt-4-0613"), Some(ModelRate::new(0.03, 0.06)));
        assert_eq!(table.rate_for("claude-3"), None);
    }

    #[test]
    fn test_mistral_latest_alias_is_priced() {
        let profile = ProviderProfile::for_kind(ProviderKind::SecondaryHosted, &settings("k", None));
        assert_eq!(
            profile.pricing.rate_for("mistral-large-latest"),
            Some(ModelRate::new(0.008, 0.024))
        );
    }

    #[test]
    fn test_supported_models_extend_defaults() {
        let mut s = settings("key", None);
        s.models = vec!["ft:gpt-3.5-turbo:acme".to_string()];
        let profile = ProviderProfile::for_kind(ProviderKind::HostedKey, &s);

        assert!(profile.supports_model("gpt-4"));
        assert!(profile.supports_model("ft:gpt-3.5-turbo:acme"));
        assert!(!profile.supports_model("claude-3"));
    }

    #[test]
    fn test_with_models_extends_defaults() {
        let base = ProviderProfile::for_kind(ProviderKind::Local, &ProviderSettings::default());
        let defaults = base.supported_models.len();
        let profile = base.with_models(["deepseek-coder", "LLAMA2", "deepseek-coder"]);

        assert!(profile.supports_model("llama2"));
        assert!(profile.supports_model("deepseek-coder"));
        assert_eq!(profile.supported_models.len(), defaults + 1);
    }

    #[test]
    fn test_local_tagged_model_matches_base() {
        let profile = ProviderProfile::for_kind(ProviderKind::Local, &ProviderSettings::default());
        assert!(profile.supports_model("llama2"));
        assert!(profile.supports_model("llama2:13b"));
        assert!(!profile.supports_model("unknown:7b"));
    }

    #[test]
    fn test_missing_credential() {
        let hosted = ProviderProfile::for_kind(ProviderKind::HostedKey, &settings("", None));
        assert!(hosted.missing_credential());
        let local = ProviderProfile::for_kind(ProviderKind::Local, &settings("", None));
        assert!(!local.missing_credential());
    }

    #[test]
    fn test_extra_headers_merged_with_defaults() {
        let mut s = settings("sk-or", None);
        let mut extra = HashMap::new();
        extra.insert("X-App-Code".to_string(), "my-app".to_string());
        s.extra_headers = Some(extra);

        let profile = ProviderProfile::for_kind(ProviderKind::Aggregator, &s);
        assert!(profile.headers.contains_key("x-app-code"));
        assert!(profile.headers.contains_key("http-referer"));
    }

    #[test]
    fn test_timeout_override() {
        let mut s = settings("k", None);
        s.timeout_secs = Some(15);
        let profile = ProviderProfile::for_kind(ProviderKind::HostedKey, &s);
        assert_eq!(profile.default_timeout, Duration::from_secs(15));

        let local = ProviderProfile::for_kind(ProviderKind::Local, &ProviderSettings::default());
        assert_eq!(local.default_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_debug_masks_key() {
        let profile = ProviderProfile::for_kind(ProviderKind::HostedKey, &settings("sk-secret-123", None));
        let dbg = format!("{profile:?}");
        assert!(!dbg.contains("sk-secret-123"));
        assert!(dbg.contains("sk-s****"));
    }

    #[test]
    fn test_profile_set_from_config() {
        let mut config = ProvidersConfig::default();
        config.mistral.enabled = false;
        let set = ProfileSet::from_config(&config);

        assert_eq!(set.len(), 4);
        assert!(!set.get(ProviderKind::SecondaryHosted).unwrap().enabled);
        let kinds: Vec<ProviderKind> = set.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, ProviderKind::ALL.to_vec());
    }
}
