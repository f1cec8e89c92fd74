//! Cost & token estimator.
//!
//! Pre-flight estimates use a characters-per-token heuristic. It depends only
//! on text length, so a longer prompt never estimates fewer tokens. After a
//! call, provider-reported usage always wins over the heuristic.

use serde::Serialize;

use openmon_core::types::{
    CanonicalRequest, CostBreakdown, ProviderKind, TokenUsage, UsageSource,
};
use openmon_providers::ollama::compose_prompt;
use openmon_providers::profile::{Pricing, ProviderProfile};
use openmon_providers::traits::RawUsage;

/// Characters per token for chat-style families.
const CHAT_CHARS_PER_TOKEN: f64 = 4.0;
/// Characters per token for local models.
const LOCAL_CHARS_PER_TOKEN: f64 = 3.5;
/// Chat framing: tokens added per message.
const TOKENS_PER_MESSAGE: u32 = 4;
/// Chat framing: tokens priming the assistant reply.
const REPLY_PRIMING_TOKENS: u32 = 3;

// ─────────────────────────────────────────────
// Outputs
// ─────────────────────────────────────────────

/// Pre-flight estimate. Advisory only; never persisted as actual usage.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub provider: ProviderKind,
    pub model: String,
    pub prompt_tokens: u32,
    pub max_completion_tokens: u32,
    pub estimated_cost: CostBreakdown,
    /// Whether a rate was found for the model (always true for free providers).
    pub priced: bool,
}

/// Token usage and cost for one finished call.
#[derive(Clone, Debug, PartialEq)]
pub struct EstimatorOutput {
    pub usage: TokenUsage,
    pub cost: CostBreakdown,
    pub source: UsageSource,
}

impl EstimatorOutput {
    /// Zero usage and cost, for calls that produced no completion.
    pub fn empty() -> Self {
        Self {
            usage: TokenUsage::default(),
            cost: CostBreakdown::zero(),
            source: UsageSource::Estimated,
        }
    }
}

// ─────────────────────────────────────────────
// CostTokenEstimator
// ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct CostTokenEstimator {
    /// Expected completion length, in characters, when `maxTokens` is unset.
    default_completion_chars: u32,
}

impl Default for CostTokenEstimator {
    fn default() -> Self {
        Self::new(100)
    }
}

impl CostTokenEstimator {
    pub fn new(default_completion_chars: u32) -> Self {
        Self {
            default_completion_chars,
        }
    }

    /// Heuristic token count for a piece of text.
    pub fn count_tokens(&self, kind: ProviderKind, text: &str) -> u32 {
        let chars_per_token = if kind.is_local() {
            LOCAL_CHARS_PER_TOKEN
        } else {
            CHAT_CHARS_PER_TOKEN
        };
        chars_to_tokens(text.chars().count(), chars_per_token)
    }

    /// Heuristic prompt token count, including chat framing.
    pub fn prompt_tokens(&self, request: &CanonicalRequest) -> u32 {
        let kind = request.provider;
        if kind.is_local() {
            let prompt = compose_prompt(request.system_message.as_deref(), &request.prompt);
            return self.count_tokens(kind, &prompt);
        }

        let mut tokens = REPLY_PRIMING_TOKENS;
        if let Some(ref system) = request.system_message {
            tokens = tokens
                .saturating_add(TOKENS_PER_MESSAGE)
                .saturating_add(self.count_tokens(kind, system));
        }
        tokens
            .saturating_add(TOKENS_PER_MESSAGE)
            .saturating_add(self.count_tokens(kind, &request.prompt))
    }

    /// Expected completion tokens: `maxTokens`, or the default completion length.
    pub fn expected_completion_tokens(&self, request: &CanonicalRequest) -> u32 {
        request.parameters.max_tokens.unwrap_or_else(|| {
            chars_to_tokens(self.default_completion_chars as usize, CHAT_CHARS_PER_TOKEN)
        })
    }

    /// Price a usage figure. Free providers skip the pricing lookup; an
    /// unpriced model costs nothing.
    pub fn cost(&self, profile: &ProviderProfile, model: &str, usage: &TokenUsage) -> CostBreakdown {
        match &profile.pricing {
            Pricing::Free => CostBreakdown::zero(),
            Pricing::Metered(table) => match table.rate_for(model) {
                Some(rate) => CostBreakdown::from_components(
                    usage.prompt_tokens() as f64 / 1000.0 * rate.prompt_per_1k,
                    usage.completion_tokens() as f64 / 1000.0 * rate.completion_per_1k,
                ),
                None => CostBreakdown::zero(),
            },
        }
    }

    /// Pre-flight estimate for a request.
    pub fn estimate(&self, request: &CanonicalRequest, profile: &ProviderProfile) -> CostEstimate {
        let prompt_tokens = self.prompt_tokens(request);
        let max_completion_tokens = self.expected_completion_tokens(request);
        let usage = TokenUsage::new(prompt_tokens, max_completion_tokens);

        CostEstimate {
            provider: request.provider,
            model: request.model.clone(),
            prompt_tokens,
            max_completion_tokens,
            estimated_cost: self.cost(profile, &request.model, &usage),
            priced: profile.pricing.rate_for(&request.model).is_some(),
        }
    }

    /// Post-flight usage and cost.
    ///
    /// Reported counts are used as-is. A missing side is derived from the
    /// reported total when possible, otherwise estimated from the text; any
    /// estimated side marks the whole figure as estimated.
    pub fn reconcile(
        &self,
        request: &CanonicalRequest,
        profile: &ProviderProfile,
        reported: Option<&RawUsage>,
        completion_text: &str,
    ) -> EstimatorOutput {
        let reported = reported.copied().unwrap_or_default();

        let (prompt, completion) = match (
            reported.prompt_tokens,
            reported.completion_tokens,
            reported.total_tokens,
        ) {
            (Some(p), Some(c), _) => (Some(p), Some(c)),
            (Some(p), None, Some(t)) => (Some(p), Some(t.saturating_sub(p))),
            (None, Some(c), Some(t)) => (Some(t.saturating_sub(c)), Some(c)),
            (p, c, _) => (p, c),
        };

        let source = if prompt.is_some() && completion.is_some() {
            UsageSource::Reported
        } else {
            UsageSource::Estimated
        };

        let usage = TokenUsage::new(
            prompt.unwrap_or_else(|| self.prompt_tokens(request)),
            completion.unwrap_or_else(|| self.count_tokens(request.provider, completion_text)),
        );

        EstimatorOutput {
            cost: self.cost(profile, &request.model, &usage),
            usage,
            source,
        }
    }
}

fn chars_to_tokens(chars: usize, chars_per_token: f64) -> u32 {
    let tokens = (chars as f64 / chars_per_token).ceil();
    if tokens >= u32::MAX as f64 {
        u32::MAX
    } else {
        tokens as u32
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
