//! Replay engine — the entry point the web layer and CLI call.
//!
//! Accepts the loose JSON inputs of the inbound API, turns them into
//! canonical requests and hands them to the [`Coordinator`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use openmon_core::config::{Config, ProviderSettings};
use openmon_core::types::{
    CanonicalRequest, CanonicalResult, ErrorCode, GenerationParams, ProviderKind, ResultError,
    Target,
};
use openmon_core::{EngineError, ValidationError};
use openmon_providers::error::ProviderError;
use openmon_providers::prober::{ConnectionProber, ProbeCredentials, ProbeReport};
use openmon_providers::profile::ProviderProfile;

use crate::dispatch::Coordinator;
use crate::estimator::{CostEstimate, CostTokenEstimator};
use crate::metrics::{compare_model_costs, ComparisonReport, ModelCostComparison};

// ─────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────

/// Optional parameter values; unset fields leave the base untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl ParamOverrides {
    /// Overlay these values on `base`.
    pub fn apply(&self, mut base: GenerationParams) -> GenerationParams {
        if let Some(t) = self.temperature {
            base.temperature = t;
        }
        if let Some(m) = self.max_tokens {
            base.max_tokens = Some(m);
        }
        if let Some(p) = self.top_p {
            base.top_p = p;
        }
        if let Some(f) = self.frequency_penalty {
            base.frequency_penalty = f;
        }
        if let Some(p) = self.presence_penalty {
            base.presence_penalty = p;
        }
        if let Some(ref stop) = self.stop {
            base.stop_sequences = stop.clone();
        }
        base
    }

    /// Field-wise merge where `self` wins over `fallback`.
    pub fn or(&self, fallback: &ParamOverrides) -> ParamOverrides {
        ParamOverrides {
            temperature: self.temperature.or(fallback.temperature),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
            top_p: self.top_p.or(fallback.top_p),
            frequency_penalty: self.frequency_penalty.or(fallback.frequency_penalty),
            presence_penalty: self.presence_penalty.or(fallback.presence_penalty),
            stop: self.stop.clone().or_else(|| fallback.stop.clone()),
        }
    }
}

/// A single replay, as the inbound API receives it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayInput {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(flatten)]
    pub parameters: ParamOverrides,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub original_log_id: Option<String>,
}

impl ReplayInput {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Validated canonical request.
    pub fn to_request(&self) -> Result<CanonicalRequest, ValidationError> {
        let provider = parse_provider(&self.provider)?;
        let mut request = CanonicalRequest::new(provider, self.model.trim(), self.prompt.as_str())
            .with_parameters(self.parameters.apply(GenerationParams::default()))
            .with_streaming(self.streaming);
        if let Some(ref system) = self.system_message {
            request = request.with_system_message(system.as_str());
        }
        request.validated()
    }
}

/// One target of a comparison, with optional per-target parameters.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareTarget {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub parameters: Option<ParamOverrides>,
}

/// A side-by-side comparison of one prompt across several targets.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareInput {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default, alias = "configurations")]
    pub providers: Vec<CompareTarget>,
    /// Batch-level parameters; per-target values win.
    #[serde(flatten)]
    pub parameters: ParamOverrides,
}

impl CompareInput {
    /// One request per target. Batch rules (size, uniqueness) are checked
    /// by the coordinator.
    pub fn to_requests(&self) -> Result<Vec<CanonicalRequest>, ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::MissingField("prompt"));
        }
        if self.providers.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }

        self.providers
            .iter()
            .map(|target| {
                let provider = parse_provider(&target.provider)?;
                if target.model.trim().is_empty() {
                    return Err(ValidationError::MissingField("model"));
                }
                let overrides = match target.parameters {
                    Some(ref own) => own.or(&self.parameters),
                    None => self.parameters.clone(),
                };
                let mut request =
                    CanonicalRequest::new(provider, target.model.trim(), self.prompt.as_str())
                        .with_parameters(overrides.apply(GenerationParams::default()));
                if let Some(ref system) = self.system_message {
                    request = request.with_system_message(system.as_str());
                }
                Ok(request)
            })
            .collect()
    }
}

/// Pre-flight cost question.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateInput {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Expected completion length in characters. Used when `maxTokens` is unset.
    #[serde(default)]
    pub estimated_completion_length: Option<u32>,
}

impl EstimateInput {
    pub fn to_request(&self) -> Result<CanonicalRequest, ValidationError> {
        ReplayInput {
            provider: self.provider.clone(),
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            system_message: self.system_message.clone(),
            parameters: ParamOverrides {
                max_tokens: self.max_tokens,
                ..Default::default()
            },
            ..Default::default()
        }
        .to_request()
    }
}

/// A previously logged prompt, as supplied by the log store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPrompt {
    pub id: String,
    pub provider: ProviderKind,
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default)]
    pub parameters: GenerationParams,
}

/// Changes applied when replaying a stored prompt.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplayOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub parameters: ParamOverrides,
}

impl StoredPrompt {
    /// The stored request with `overrides` merged in; overrides win.
    pub fn to_request(&self, overrides: &ReplayOverrides) -> Result<CanonicalRequest, ValidationError> {
        let provider = match overrides.provider.as_deref() {
            Some(p) if !p.trim().is_empty() => parse_provider(p)?,
            _ => self.provider,
        };
        let model = match overrides.model.as_deref() {
            Some(m) if !m.trim().is_empty() => m.trim(),
            _ => self.model.as_str(),
        };
        let mut request = CanonicalRequest::new(provider, model, self.prompt.as_str())
            .with_parameters(overrides.parameters.apply(self.parameters.clone()));
        if let Some(ref system) = self.system_message {
            request = request.with_system_message(system.as_str());
        }
        request.validated()
    }
}

fn parse_provider(raw: &str) -> Result<ProviderKind, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::MissingField("provider"));
    }
    raw.parse()
}

// ─────────────────────────────────────────────
// Stream events
// ─────────────────────────────────────────────

/// Events emitted by [`ReplayEngine::stream_replay`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    Chunk {
        content: String,
    },
    Complete {
        result: Box<CanonicalResult>,
    },
    Failed {
        error: ResultError,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Box<CanonicalResult>>,
    },
}

// ─────────────────────────────────────────────
// ReplayEngine
// ─────────────────────────────────────────────

pub struct ReplayEngine {
    coordinator: Arc<Coordinator>,
    prober: ConnectionProber,
}

impl ReplayEngine {
    pub fn new(coordinator: Coordinator, probe_timeout: Duration) -> Self {
        let prober = ConnectionProber::new(Arc::clone(coordinator.adapters()), probe_timeout);
        Self {
            coordinator: Arc::new(coordinator),
            prober,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Coordinator::from_config(config),
            Duration::from_secs(config.probe.timeout_secs),
        )
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn prober(&self) -> &ConnectionProber {
        &self.prober
    }

    /// Replay one prompt against one target.
    pub async fn replay(&self, input: &ReplayInput) -> Result<CanonicalResult, EngineError> {
        let request = input.to_request()?;
        self.replay_request(request, input.original_log_id.clone()).await
    }

    /// Replay an already-built request.
    pub async fn replay_request(
        &self,
        request: CanonicalRequest,
        original_log_id: Option<String>,
    ) -> Result<CanonicalResult, EngineError> {
        info!(provider = %request.provider, model = %request.model, "Replaying prompt");
        let mut results = self.coordinator.dispatch_batch(vec![request]).await?;
        let result = results
            .pop()
            .ok_or_else(|| EngineError::Internal("single replay produced no result".to_string()))?;
        Ok(result.with_original_log_id(original_log_id))
    }

    /// Replay a logged prompt, optionally against another target or with
    /// different parameters.
    pub async fn replay_from_log(
        &self,
        stored: &StoredPrompt,
        overrides: &ReplayOverrides,
    ) -> Result<CanonicalResult, EngineError> {
        let request = stored.to_request(overrides)?;
        debug!(log_id = %stored.id, "Replaying from log");
        self.replay_request(request, Some(stored.id.clone())).await
    }

    /// Run one prompt against every listed target and rank the outcomes.
    pub async fn compare(&self, input: &CompareInput) -> Result<ComparisonReport, EngineError> {
        let requests = input.to_requests()?;
        let results = self.coordinator.dispatch_batch(requests).await?;
        let system_message = input
            .system_message
            .clone()
            .filter(|s| !s.is_empty());
        Ok(ComparisonReport::new(input.prompt.clone(), system_message, results))
    }

    /// Pre-flight token and cost estimate. Does not contact the provider.
    pub async fn estimate(&self, input: &EstimateInput) -> Result<CostEstimate, EngineError> {
        let request = input.to_request()?;
        let profile = self.profile_for(request.provider).await;
        let estimator = match input.estimated_completion_length {
            Some(chars) if request.parameters.max_tokens.is_none() => CostTokenEstimator::new(chars),
            _ => *self.coordinator.estimator(),
        };
        Ok(estimator.estimate(&request, &profile))
    }

    /// Replay and deliver the completion as events.
    ///
    /// Providers are called non-streaming, so the completion arrives as a
    /// single chunk followed by `Complete`. A closed receiver is not an error.
    pub async fn stream_replay(
        &self,
        input: &ReplayInput,
        events: mpsc::Sender<ReplayEvent>,
    ) -> Result<(), EngineError> {
        let result = match self.replay(input).await {
            Ok(result) => result,
            Err(e) => {
                let event = ReplayEvent::Failed {
                    error: ResultError {
                        message: e.to_string(),
                        code: e.code(),
                        http_status: None,
                    },
                    result: None,
                };
                let _ = events.send(event).await;
                return Err(e);
            }
        };

        let sequence = match result.error.clone() {
            None => vec![
                ReplayEvent::Chunk {
                    content: result.completion_text.clone(),
                },
                ReplayEvent::Complete {
                    result: Box::new(result),
                },
            ],
            Some(error) => vec![ReplayEvent::Failed {
                error,
                result: Some(Box::new(result)),
            }],
        };

        for event in sequence {
            if events.send(event).await.is_err() {
                debug!("Stream receiver dropped");
                break;
            }
        }
        Ok(())
    }

    /// Reachability/auth check for one provider.
    pub async fn probe(&self, kind: ProviderKind, credentials: Option<&ProbeCredentials>) -> ProbeReport {
        let profile = self.profile_for(kind).await;
        self.prober.probe(&profile, credentials).await
    }

    /// Probe every enabled provider.
    pub async fn probe_all(&self) -> Vec<ProbeReport> {
        let profiles = self.coordinator.profiles().await;
        self.prober.probe_all(&profiles).await
    }

    /// Model ids served by a provider.
    pub async fn list_models(&self, kind: ProviderKind) -> Result<Vec<String>, ProviderError> {
        let profile = self.profile_for(kind).await;
        if profile.missing_credential() {
            return Err(ProviderError::new(
                ErrorCode::Authentication,
                format!("no API key configured for {kind}"),
            ));
        }
        self.prober.list_models(&profile).await
    }

    /// Every target in `targets`, ranked cheapest first for `token_count` tokens.
    pub async fn compare_costs(&self, targets: &[Target], token_count: u32) -> Vec<ModelCostComparison> {
        let profiles = self.coordinator.profiles().await;
        compare_model_costs(self.coordinator.estimator(), &profiles, targets, token_count)
    }

    async fn profile_for(&self, kind: ProviderKind) -> ProviderProfile {
        let profiles = self.coordinator.profiles().await;
        match profiles.get(kind) {
            Some(profile) => profile.clone(),
            None => ProviderProfile::for_kind(kind, &ProviderSettings::default()),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
