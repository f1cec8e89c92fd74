//! Canonical types — the provider-agnostic request/result model.
//!
//! Every provider adapter translates *from* [`CanonicalRequest`] into its own
//! wire format and the engine always hands back a [`CanonicalResult`], so
//! callers never branch on provider-specific shapes.
//!
//! All types serialize with camelCase keys, matching what the dashboard and
//! the log store expect.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::utils::round_cost;

// ─────────────────────────────────────────────
// Provider kinds
// ─────────────────────────────────────────────

/// The supported provider families.
///
/// Serializes as the canonical kebab-case kind. Deserialization goes through
/// [`FromStr`], so family names (`openai`, `ollama`, `openrouter`, `mistral`)
/// are accepted too, in any case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum ProviderKind {
    /// Hosted API with a bearer key (OpenAI).
    HostedKey,
    /// Self-hosted model server (Ollama). Always free.
    Local,
    /// Multi-vendor aggregator (OpenRouter).
    Aggregator,
    /// Second hosted API (Mistral).
    SecondaryHosted,
}

impl ProviderKind {
    /// All kinds, in display order.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::HostedKey,
        ProviderKind::Local,
        ProviderKind::Aggregator,
        ProviderKind::SecondaryHosted,
    ];

    /// Canonical wire name (e.g. `"hosted-key"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::HostedKey => "hosted-key",
            ProviderKind::Local => "local",
            ProviderKind::Aggregator => "aggregator",
            ProviderKind::SecondaryHosted => "secondary-hosted",
        }
    }

    /// Concrete family name, used for config sections and env vars.
    pub fn family(&self) -> &'static str {
        match self {
            ProviderKind::HostedKey => "openai",
            ProviderKind::Local => "ollama",
            ProviderKind::Aggregator => "openrouter",
            ProviderKind::SecondaryHosted => "mistral",
        }
    }

    /// Whether this provider runs locally and never costs anything.
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Local)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.as_str() == lower || k.family() == lower)
            .ok_or_else(|| ValidationError::UnknownProvider(s.to_string()))
    }
}

impl TryFrom<String> for ProviderKind {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ─────────────────────────────────────────────
// Targets
// ─────────────────────────────────────────────

/// A `(provider, model)` pair. Results are correlated to targets by this tag,
/// never by position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub provider: ProviderKind,
    pub model: String,
}

impl Target {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Target {
            provider,
            model: model.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

// ─────────────────────────────────────────────
// Canonical request
// ─────────────────────────────────────────────

/// Sampling parameters shared by every provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationParams {
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Completion cap. `None` lets the provider decide.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling (0.0 – 1.0).
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    /// Stop sequences, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            max_tokens: None,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop_sequences: Vec::new(),
        }
    }
}

impl GenerationParams {
    /// Validate and clamp into provider-safe ranges.
    ///
    /// NaN/infinite values and a zero `max_tokens` are rejected; in-range
    /// violations are clamped.
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        let checks = [
            ("temperature", self.temperature),
            ("topP", self.top_p),
            ("frequencyPenalty", self.frequency_penalty),
            ("presencePenalty", self.presence_penalty),
        ];
        if let Some(&(field, _)) = checks.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::NotFinite(field));
        }
        if self.max_tokens == Some(0) {
            return Err(ValidationError::NonPositiveMaxTokens);
        }

        self.temperature = self.temperature.clamp(0.0, 2.0);
        self.top_p = self.top_p.clamp(0.0, 1.0);
        self.frequency_penalty = self.frequency_penalty.clamp(-2.0, 2.0);
        self.presence_penalty = self.presence_penalty.clamp(-2.0, 2.0);
        self.stop_sequences.retain(|s| !s.is_empty());
        Ok(self)
    }
}

/// One generation request, independent of any provider's wire format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRequest {
    pub provider: ProviderKind,
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(default)]
    pub parameters: GenerationParams,
    #[serde(default)]
    pub streaming: bool,
}

impl CanonicalRequest {
    /// Create a request with default parameters.
    pub fn new(provider: ProviderKind, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        CanonicalRequest {
            provider,
            model: model.into(),
            prompt: prompt.into(),
            system_message: None,
            parameters: GenerationParams::default(),
            streaming: false,
        }
    }

    pub fn with_system_message(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.system_message = if system.is_empty() { None } else { Some(system) };
        self
    }

    pub fn with_parameters(mut self, parameters: GenerationParams) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Check required fields and clamp parameters.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingField("model"));
        }
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::MissingField("prompt"));
        }
        self.parameters = self.parameters.normalized()?;
        Ok(self)
    }

    /// The same request re-addressed to another target.
    pub fn for_target(&self, target: &Target) -> Self {
        CanonicalRequest {
            provider: target.provider,
            model: target.model.clone(),
            ..self.clone()
        }
    }

    pub fn target(&self) -> Target {
        Target::new(self.provider, self.model.clone())
    }
}

// ─────────────────────────────────────────────
// Token usage & cost
// ─────────────────────────────────────────────

/// Token counts. `total_tokens == prompt_tokens + completion_tokens` always;
/// the only constructor computes the total, clamping the completion count so
/// the sum fits in a `u32`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "UsageCounts")]
pub struct TokenUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        let completion_tokens = completion_tokens.min(u32::MAX - prompt_tokens);
        TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn prompt_tokens(&self) -> u32 {
        self.prompt_tokens
    }

    pub fn completion_tokens(&self) -> u32 {
        self.completion_tokens
    }

    pub fn total_tokens(&self) -> u32 {
        self.total_tokens
    }
}

/// Deserialization shape for [`TokenUsage`]; any incoming total is recomputed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageCounts {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl From<UsageCounts> for TokenUsage {
    fn from(c: UsageCounts) -> Self {
        TokenUsage::new(c.prompt_tokens, c.completion_tokens)
    }
}

/// Where a result's token counts came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    /// The provider reported usage.
    #[default]
    Reported,
    /// The provider omitted usage; counts come from the local heuristic.
    Estimated,
}

/// Monetary cost of one call, rounded to 4 decimal places.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub prompt_cost: f64,
    pub completion_cost: f64,
    pub total_cost: f64,
    pub currency: String,
}

impl Default for CostBreakdown {
    fn default() -> Self {
        Self::zero()
    }
}

impl CostBreakdown {
    /// `{0, 0, 0}` in USD.
    pub fn zero() -> Self {
        CostBreakdown {
            prompt_cost: 0.0,
            completion_cost: 0.0,
            total_cost: 0.0,
            currency: "USD".to_string(),
        }
    }

    /// Build from raw (unrounded) component costs.
    pub fn from_components(prompt_cost: f64, completion_cost: f64) -> Self {
        let prompt_cost = round_cost(prompt_cost);
        let completion_cost = round_cost(completion_cost);
        CostBreakdown {
            prompt_cost,
            completion_cost,
            total_cost: round_cost(prompt_cost + completion_cost),
            currency: "USD".to_string(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total_cost == 0.0
    }
}

// ─────────────────────────────────────────────
// Status & errors
// ─────────────────────────────────────────────

/// Outcome of one `(request, target)` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
    Timeout,
    RateLimited,
}

/// Error taxonomy shared by results and engine errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Authentication,
    RateLimited,
    Timeout,
    ModelOverloaded,
    ContentPolicy,
    Network,
    Internal,
}

impl ErrorCode {
    /// Transient classes are safe to retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::Timeout | ErrorCode::RateLimited | ErrorCode::Network
        )
    }

    /// The result status a failure of this class produces.
    pub fn status(&self) -> ResultStatus {
        match self {
            ErrorCode::Timeout => ResultStatus::Timeout,
            ErrorCode::RateLimited => ResultStatus::RateLimited,
            _ => ResultStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "validation",
            ErrorCode::Authentication => "authentication",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::Timeout => "timeout",
            ErrorCode::ModelOverloaded => "model_overloaded",
            ErrorCode::ContentPolicy => "content_policy",
            ErrorCode::Network => "network",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error detail carried by a non-success result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultError {
    pub message: String,
    pub code: ErrorCode,
    /// HTTP status, when the provider answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

/// One failed attempt in a target's retry history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub error: String,
    pub code: ErrorCode,
    pub latency_ms: u64,
}

// ─────────────────────────────────────────────
// Canonical result
// ─────────────────────────────────────────────

/// The normalized record produced once per `(request, target)` pair.
///
/// Ownership passes to the caller; the engine keeps no reference to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResult {
    pub request_id: String,
    pub target: Target,
    pub status: ResultStatus,
    /// Empty unless `status == Success`.
    pub completion_text: String,
    pub token_usage: TokenUsage,
    pub usage_source: UsageSource,
    pub cost: CostBreakdown,
    pub latency_ms: u64,
    pub retry_attempts: u32,
    pub retry_history: Vec<RetryRecord>,
    /// Present iff `status != Success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    pub parameters: GenerationParams,
    pub replayed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_log_id: Option<String>,
    /// Always true for engine output; lets the log store tell replays apart.
    pub is_replay: bool,
}

impl CanonicalResult {
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }

    /// Link this result to the log entry it replays.
    pub fn with_original_log_id(mut self, id: Option<String>) -> Self {
        self.original_log_id = id;
        self
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
