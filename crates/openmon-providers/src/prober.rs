//! Connection prober — a cheap reachability/auth check per provider.
//!
//! A probe lists the provider's models under a short fixed deadline and
//! reports the outcome as data. It never returns an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use openmon_core::types::ProviderKind;

use crate::adapters::AdapterSet;
use crate::error::ProviderError;
use crate::profile::{ProfileSet, ProviderProfile};

/// Credentials to try instead of the configured ones (e.g. "test this key").
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeCredentials {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

/// Outcome of one probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub provider: ProviderKind,
    pub connected: bool,
    pub latency_ms: u64,
    pub status_detail: String,
    pub models_found: usize,
    pub checked_at: DateTime<Utc>,
}

impl ProbeReport {
    fn new(provider: ProviderKind, connected: bool, latency_ms: u64, detail: String, models: usize) -> Self {
        Self {
            provider,
            connected,
            latency_ms,
            status_detail: detail,
            models_found: models,
            checked_at: Utc::now(),
        }
    }
}

/// Probes providers with a fixed, short timeout.
#[derive(Clone, Debug)]
pub struct ConnectionProber {
    adapters: Arc<AdapterSet>,
    timeout: Duration,
}

impl ConnectionProber {
    pub fn new(adapters: Arc<AdapterSet>, timeout: Duration) -> Self {
        Self { adapters, timeout }
    }

    /// The deadline used for `profile`: the configured probe timeout, never
    /// longer than half the provider's generation timeout.
    pub fn deadline_for(&self, profile: &ProviderProfile) -> Duration {
        self.timeout.min(profile.default_timeout / 2)
    }

    /// Check reachability and authentication for one provider.
    pub async fn probe(
        &self,
        profile: &ProviderProfile,
        credentials: Option<&ProbeCredentials>,
    ) -> ProbeReport {
        let profile = apply_credentials(profile.clone(), credentials);
        let kind = profile.kind;

        if profile.missing_credential() {
            return ProbeReport::new(kind, false, 0, "no API key configured".to_string(), 0);
        }

        let started = Instant::now();
        let result = self.list_models(&profile).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(models) => {
                info!(provider = %kind, latency_ms, models = models.len(), "Probe succeeded");
                let detail = format!("connected to {}", profile.api_base);
                ProbeReport::new(kind, true, latency_ms, detail, models.len())
            }
            Err(e) => {
                warn!(provider = %kind, code = %e.code, error = %e, "Probe failed");
                let detail = format!("{}: {}", e.code, e.message);
                ProbeReport::new(kind, false, latency_ms, detail, 0)
            }
        }
    }

    /// List model ids served by the provider.
    pub async fn list_models(&self, profile: &ProviderProfile) -> Result<Vec<String>, ProviderError> {
        let adapter = self.adapters.get(profile.kind).ok_or_else(|| {
            ProviderError::validation(format!("no adapter registered for {}", profile.kind))
        })?;
        let deadline = self.deadline_for(profile);
        debug!(provider = %profile.kind, deadline_ms = deadline.as_millis() as u64, "Listing models");
        adapter.list_models(profile, deadline).await
    }

    /// Probe every enabled profile concurrently. Reports come back in
    /// provider-kind order.
    pub async fn probe_all(&self, profiles: &ProfileSet) -> Vec<ProbeReport> {
        let mut tasks = JoinSet::new();
        for profile in profiles.iter().filter(|p| p.enabled) {
            let prober = self.clone();
            let profile = profile.clone();
            tasks.spawn(async move { prober.probe(&profile, None).await });
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "Probe task failed"),
            }
        }
        reports.sort_by_key(|r| r.provider);
        reports
    }
}

fn apply_credentials(
    mut profile: ProviderProfile,
    credentials: Option<&ProbeCredentials>,
) -> ProviderProfile {
    let Some(creds) = credentials else {
        return profile;
    };
    if let Some(ref key) = creds.api_key {
        profile = profile.with_api_key(key.clone());
    }
    if let Some(ref base) = creds.api_base {
        if !base.trim().is_empty() {
            profile = profile.with_api_base(base.clone());
        }
    }
    profile
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
