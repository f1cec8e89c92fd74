//! Config loader — reads `~/.openmon/config.json`, merges env vars, and
//! applies legacy migrations.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.openmon/config.json`
//! 3. Conventional provider env vars (`OPENAI_API_KEY`, `OLLAMA_BASE_URL`, …)
//!    fill in credentials the file leaves empty
//! 4. Environment variables `OPENMON_<SECTION>__<FIELD>` (override everything)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, ProviderSettings};
use crate::types::ProviderKind;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    migrate_config(&mut raw);

    let config: Config = match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to deserialize config: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// Older configs stored endpoints as `providers.<name>.baseUrl`; the schema
/// now calls it `apiBase`.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(providers) = raw.get_mut("providers").and_then(|p| p.as_object_mut()) else {
        return;
    };

    for (name, section) in providers.iter_mut() {
        let Some(section) = section.as_object_mut() else {
            continue;
        };
        if section.contains_key("apiBase") {
            continue;
        }
        if let Some(base) = section.remove("baseUrl") {
            section.insert("apiBase".to_string(), base);
            debug!(provider = %name, "Migrated providers.{name}.baseUrl → apiBase");
        }
    }
}

/// Conventional env var holding a provider's credential or endpoint.
fn conventional_env(kind: ProviderKind) -> (&'static str, &'static str) {
    match kind {
        ProviderKind::HostedKey => ("OPENAI_API_KEY", "OPENAI_BASE_URL"),
        ProviderKind::Local => ("OLLAMA_API_KEY", "OLLAMA_BASE_URL"),
        ProviderKind::Aggregator => ("OPENROUTER_API_KEY", "OPENROUTER_BASE_URL"),
        ProviderKind::SecondaryHosted => ("MISTRAL_API_KEY", "MISTRAL_BASE_URL"),
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `OPENMON_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `OPENMON_PROVIDERS__<NAME>__API_KEY` → `providers.<name>.api_key`
/// - `OPENMON_PROVIDERS__<NAME>__API_BASE` → `providers.<name>.api_base`
/// - `OPENMON_PROVIDERS__<NAME>__TIMEOUT_SECS` → `providers.<name>.timeout_secs`
/// - `OPENMON_RETRY__<NAME>__MAX_RETRIES` → `retry.<name>.max_retries`
/// - `OPENMON_DISPATCH__MAX_COMPARISON_TARGETS` → `dispatch.max_comparison_targets`
/// - `OPENMON_PROBE__TIMEOUT_SECS` → `probe.timeout_secs`
fn apply_env_overrides(mut config: Config) -> Config {
    for kind in ProviderKind::ALL {
        let name = kind.family().to_ascii_uppercase();

        let (key_var, base_var) = conventional_env(kind);
        apply_conventional_env(config.providers.get_mut(kind), key_var, base_var);
        apply_provider_env(config.providers.get_mut(kind), &name);

        if let Ok(val) = std::env::var(format!("OPENMON_RETRY__{name}__MAX_RETRIES")) {
            if let Ok(n) = val.parse::<u32>() {
                config.retry.for_provider_mut(kind).max_retries = n;
            }
        }
    }

    if let Ok(val) = std::env::var("OPENMON_DISPATCH__MAX_COMPARISON_TARGETS") {
        if let Ok(n) = val.parse::<usize>() {
            config.dispatch.max_comparison_targets = n;
        }
    }
    if let Ok(val) = std::env::var("OPENMON_PROBE__TIMEOUT_SECS") {
        if let Ok(n) = val.parse::<u64>() {
            config.probe.timeout_secs = n;
        }
    }

    config
}

/// Fill empty credentials/endpoints from the provider's conventional env vars.
fn apply_conventional_env(provider: &mut ProviderSettings, key_var: &str, base_var: &str) {
    if provider.api_key.is_empty() {
        if let Ok(val) = std::env::var(key_var) {
            provider.api_key = val;
        }
    }
    if provider.api_base.is_none() {
        if let Ok(val) = std::env::var(base_var) {
            provider.api_base = Some(val);
        }
    }
}

/// Apply `OPENMON_PROVIDERS__<NAME>__*` overrides for a single provider.
fn apply_provider_env(provider: &mut ProviderSettings, name: &str) {
    if let Ok(val) = std::env::var(format!("OPENMON_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("OPENMON_PROVIDERS__{name}__API_BASE")) {
        provider.api_base = Some(val);
    }
    if let Ok(val) = std::env::var(format!("OPENMON_PROVIDERS__{name}__TIMEOUT_SECS")) {
        if let Ok(n) = val.parse::<u64>() {
            provider.timeout_secs = Some(n);
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        assert_eq!(config.dispatch.max_comparison_targets, 5);
        assert_eq!(config.probe.timeout_secs, 10);
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(
            r#"{
            "providers": {
                "mistral": { "apiKey": "ms-123", "models": ["open-mixtral-8x22b"] }
            },
            "probe": { "timeoutSecs": 3 }
        }"#,
        );

        let config = load_config_from_path(file.path());
        assert_eq!(config.providers.mistral.api_key, "ms-123");
        assert_eq!(config.providers.mistral.models, vec!["open-mixtral-8x22b"]);
        assert_eq!(config.probe.timeout_secs, 3);
        // Default preserved
        assert_eq!(config.dispatch.max_comparison_targets, 5);
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        let config = load_config_from_path(file.path());
        assert_eq!(config.dispatch.max_comparison_targets, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.providers.openrouter.api_key = "sk-or-test".to_string();
        config.dispatch.max_comparison_targets = 4;

        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path);
        assert_eq!(reloaded.providers.openrouter.api_key, "sk-or-test");
        assert_eq!(reloaded.dispatch.max_comparison_targets, 4);
    }

    #[test]
    fn test_migrate_base_url() {
        let file = write_temp_json(
            r#"{
            "providers": {
                "ollama": { "baseUrl": "http://10.0.0.5:11434" }
            }
        }"#,
        );

        let config = load_config_from_path(file.path());
        assert_eq!(
            config.providers.ollama.api_base.as_deref(),
            Some("http://10.0.0.5:11434")
        );
    }

    #[test]
    fn test_migrate_no_overwrite() {
        let file = write_temp_json(
            r#"{
            "providers": {
                "ollama": { "baseUrl": "http://old:11434", "apiBase": "http://new:11434" }
            }
        }"#,
        );

        let config = load_config_from_path(file.path());
        assert_eq!(config.providers.ollama.api_base.as_deref(), Some("http://new:11434"));
    }

    #[test]
    fn test_env_override_provider_key() {
        std::env::set_var("OPENMON_PROVIDERS__OPENAI__API_KEY", "sk-env-key");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.providers.openai.api_key, "sk-env-key");
        std::env::remove_var("OPENMON_PROVIDERS__OPENAI__API_KEY");
    }

    #[test]
    fn test_env_override_retry() {
        std::env::set_var("OPENMON_RETRY__OPENROUTER__MAX_RETRIES", "7");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.retry.openrouter.max_retries, 7);
        std::env::remove_var("OPENMON_RETRY__OPENROUTER__MAX_RETRIES");
    }

    #[test]
    fn test_saved_json_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        save_config(&Config::default(), Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert!(raw["dispatch"].get("maxComparisonTargets").is_some());
        assert!(raw["dispatch"].get("max_comparison_targets").is_none());
    }
}
