//! Comparison rankings and analytics over canonical results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use openmon_core::config::ProviderSettings;
use openmon_core::types::{CanonicalResult, ErrorCode, ProviderKind, Target, TokenUsage};
use openmon_core::utils::round_cost;
use openmon_providers::profile::{ProfileSet, ProviderProfile};

use crate::estimator::CostTokenEstimator;

// ─────────────────────────────────────────────
// Comparison report
// ─────────────────────────────────────────────

/// One ranked entry, labelled `provider/model`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub config: String,
    pub value: f64,
}

/// Rankings across the successful targets of a comparison.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMetrics {
    /// Fastest first.
    pub latency: Vec<RankEntry>,
    /// Cheapest first.
    pub cost: Vec<RankEntry>,
    /// Fewest tokens first.
    pub tokens: Vec<RankEntry>,
    /// Longest response first.
    pub response_length: Vec<RankEntry>,
}

impl ComparisonMetrics {
    /// Rankings over successful results; `None` unless at least two succeeded.
    pub fn from_results(results: &[CanonicalResult]) -> Option<Self> {
        let ok: Vec<&CanonicalResult> = results.iter().filter(|r| r.is_success()).collect();
        if ok.len() < 2 {
            return None;
        }

        Some(Self {
            latency: ranked(&ok, |r| r.latency_ms as f64, false),
            cost: ranked(&ok, |r| r.cost.total_cost, false),
            tokens: ranked(&ok, |r| r.token_usage.total_tokens() as f64, false),
            response_length: ranked(&ok, |r| r.completion_text.chars().count() as f64, true),
        })
    }
}

fn ranked<F>(results: &[&CanonicalResult], value: F, descending: bool) -> Vec<RankEntry>
where
    F: Fn(&CanonicalResult) -> f64,
{
    let mut entries: Vec<RankEntry> = results
        .iter()
        .map(|r| RankEntry {
            config: r.target.to_string(),
            value: value(*r),
        })
        .collect();
    entries.sort_by(|a, b| {
        let ord = a.value.total_cmp(&b.value);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    entries
}

/// Side-by-side results for one prompt.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<CanonicalResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ComparisonMetrics>,
}

impl ComparisonReport {
    pub fn new(prompt: String, system_message: Option<String>, results: Vec<CanonicalResult>) -> Self {
        Self {
            metrics: ComparisonMetrics::from_results(&results),
            prompt,
            system_message,
            timestamp: Utc::now(),
            results,
        }
    }

    /// The result for a given target, if it was part of the batch.
    pub fn result_for(&self, target: &Target) -> Option<&CanonicalResult> {
        self.results.iter().find(|r| &r.target == target)
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }
}

// ─────────────────────────────────────────────
// Retry analysis
// ─────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryAnalysis {
    pub total_retries: u32,
    pub failed_attempts: usize,
    pub total_latency_ms: u64,
    pub avg_latency_ms: u64,
    pub error_patterns: BTreeMap<ErrorCode, u32>,
    pub success_on_retry: bool,
    pub last_attempt_succeeded: bool,
}

/// Summarize a result's retry history.
pub fn analyze_retries(result: &CanonicalResult) -> RetryAnalysis {
    let history = &result.retry_history;
    let total_latency_ms: u64 = history.iter().map(|r| r.latency_ms).sum();
    let avg_latency_ms = if history.is_empty() {
        0
    } else {
        (total_latency_ms as f64 / history.len() as f64).round() as u64
    };

    let mut error_patterns = BTreeMap::new();
    for record in history {
        *error_patterns.entry(record.code).or_insert(0) += 1;
    }

    RetryAnalysis {
        total_retries: result.retry_attempts,
        failed_attempts: history.len(),
        total_latency_ms,
        avg_latency_ms,
        error_patterns,
        success_on_retry: result.is_success() && result.retry_attempts > 0,
        last_attempt_succeeded: result.is_success(),
    }
}

// ─────────────────────────────────────────────
// Cost summary
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBucket {
    pub cost: f64,
    pub requests: usize,
}

/// Totals over many results, with per-provider and per-model breakdowns.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_cost: f64,
    pub total_prompt_cost: f64,
    pub total_completion_cost: f64,
    pub request_count: usize,
    pub by_provider: BTreeMap<ProviderKind, CostBucket>,
    pub by_model: BTreeMap<String, CostBucket>,
    pub currency: String,
}

impl CostSummary {
    pub fn from_results(results: &[CanonicalResult]) -> Self {
        let mut summary = CostSummary {
            request_count: results.len(),
            currency: "USD".to_string(),
            ..Default::default()
        };

        for result in results {
            let cost = &result.cost;
            summary.total_cost += cost.total_cost;
            summary.total_prompt_cost += cost.prompt_cost;
            summary.total_completion_cost += cost.completion_cost;

            let provider = summary.by_provider.entry(result.target.provider).or_default();
            provider.cost += cost.total_cost;
            provider.requests += 1;

            let model = summary.by_model.entry(result.target.to_string()).or_default();
            model.cost += cost.total_cost;
            model.requests += 1;
        }

        summary.total_cost = round_cost(summary.total_cost);
        summary.total_prompt_cost = round_cost(summary.total_prompt_cost);
        summary.total_completion_cost = round_cost(summary.total_completion_cost);
        for bucket in summary
            .by_provider
            .values_mut()
            .chain(summary.by_model.values_mut())
        {
            bucket.cost = round_cost(bucket.cost);
        }
        summary
    }
}

// ─────────────────────────────────────────────
// Model cost comparison
// ─────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCostComparison {
    pub provider: ProviderKind,
    pub model: String,
    pub token_count: u32,
    pub cost: f64,
}

/// Cost of `token_count` tokens (split evenly between prompt and completion)
/// for each target, cheapest first.
pub fn compare_model_costs(
    estimator: &CostTokenEstimator,
    profiles: &ProfileSet,
    targets: &[Target],
    token_count: u32,
) -> Vec<ModelCostComparison> {
    let prompt = token_count / 2;
    let usage = TokenUsage::new(prompt, token_count - prompt);

    let mut comparisons: Vec<ModelCostComparison> = targets
        .iter()
        .map(|target| {
            let cost = match profiles.get(target.provider) {
                Some(profile) => estimator.cost(profile, &target.model, &usage),
                None => {
                    let profile = ProviderProfile::for_kind(target.provider, &ProviderSettings::default());
                    estimator.cost(&profile, &target.model, &usage)
                }
            };
            ModelCostComparison {
                provider: target.provider,
                model: target.model.clone(),
                token_count,
                cost: cost.total_cost,
            }
        })
        .collect();

    comparisons.sort_by(|a, b| a.cost.total_cmp(&b.cost));
    comparisons
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use openmon_core::types::{
        CanonicalRequest, CostBreakdown, ResultError, ResultStatus, RetryRecord, UsageSource,
    };

    fn result(
        kind: ProviderKind,
        model: &str,
        latency_ms: u64,
        cost: f64,
        tokens: u32,
        text: &str,
    ) -> CanonicalResult {
        let request = CanonicalRequest::new(kind, model, "prompt");
        CanonicalResult {
            request_id: format!("{kind}-{model}"),
            target: request.target(),
            status: ResultStatus::Success,
            completion_text: text.to_string(),
            token_usage: TokenUsage::new(tokens / 2, tokens - tokens / 2),
            usage_source: UsageSource::Reported,
            cost: CostBreakdown::from_components(cost / 2.0, cost / 2.0),
            latency_ms,
            retry_attempts: 0,
            retry_history: Vec::new(),
            error: None,
            finish_reason: Some("stop".to_string()),
            prompt: request.prompt,
            system_message: None,
            parameters: request.parameters,
            replayed_at: Utc::now(),
            original_log_id: None,
            is_replay: true,
        }
    }

    fn failed(kind: ProviderKind, model: &str, code: ErrorCode, retries: u32) -> CanonicalResult {
        let mut r = result(kind, model, 10, 0.0, 0, "");
        r.status = code.status();
        r.retry_attempts = retries;
        r.retry_history = (1..=retries + 1)
            .map(|attempt| RetryRecord {
                attempt,
                timestamp: Utc::now(),
                error: "boom".to_string(),
                code,
                latency_ms: 10 * attempt as u64,
            })
            .collect();
        r.error = Some(ResultError {
            message: "boom".to_string(),
            code,
            http_status: None,
        });
        r
    }

    #[test]
    fn test_metrics_need_two_successes() {
        let one = vec![
            result(ProviderKind::Local, "llama2", 100, 0.0, 10, "a"),
            failed(ProviderKind::HostedKey, "gpt-4", ErrorCode::Authentication, 0),
        ];
        assert!(ComparisonMetrics::from_results(&one).is_none());
    }

    #[test]
    fn test_metrics_rankings() {
        let results = vec![
            result(ProviderKind::HostedKey, "gpt-4", 900, 0.02, 40, "short"),
            result(ProviderKind::Local, "llama2", 300, 0.0, 60, "a much longer answer"),
            failed(ProviderKind::Aggregator, "openai/gpt-4", ErrorCode::Network, 2),
        ];
        let metrics = ComparisonMetrics::from_results(&results).unwrap();

        assert_eq!(metrics.latency[0].config, "local/llama2");
        assert_eq!(metrics.cost[0].config, "local/llama2");
        assert_eq!(metrics.tokens[0].config, "hosted-key/gpt-4");
        assert_eq!(metrics.response_length[0].config, "local/llama2");
        assert_eq!(metrics.latency.len(), 2);
    }

    #[test]
    fn test_report_lookup_by_target() {
        let report = ComparisonReport::new(
            "prompt".to_string(),
            None,
            vec![
                result(ProviderKind::Local, "llama2", 1, 0.0, 2, "x"),
                failed(ProviderKind::HostedKey, "gpt-4", ErrorCode::Timeout, 1),
            ],
        );
        assert_eq!(report.success_count(), 1);
        assert!(report.metrics.is_none());
        let hosted = report
            .result_for(&Target::new(ProviderKind::HostedKey, "gpt-4"))
            .unwrap();
        assert_eq!(hosted.status, ResultStatus::Timeout);
    }

    #[test]
    fn test_analyze_retries() {
        let analysis = analyze_retries(&failed(ProviderKind::HostedKey, "gpt-4", ErrorCode::RateLimited, 2));
        assert_eq!(analysis.total_retries, 2);
        assert_eq!(analysis.failed_attempts, 3);
        assert_eq!(analysis.total_latency_ms, 60);
        assert_eq!(analysis.avg_latency_ms, 20);
        assert_eq!(analysis.error_patterns[&ErrorCode::RateLimited], 3);
        assert!(!analysis.last_attempt_succeeded);
        assert!(!analysis.success_on_retry);
    }

    #[test]
    fn test_analyze_clean_success() {
        let analysis = analyze_retries(&result(ProviderKind::Local, "llama2", 5, 0.0, 4, "ok"));
        assert_eq!(analysis.total_retries, 0);
        assert_eq!(analysis.avg_latency_ms, 0);
        assert!(analysis.error_patterns.is_empty());
        assert!(analysis.last_attempt_succeeded);
    }

    #[test]
    fn test_cost_summary() {
        let results = vec![
            result(ProviderKind::HostedKey, "gpt-4", 1, 0.02, 10, "a"),
            result(ProviderKind::HostedKey, "gpt-4", 1, 0.04, 10, "b"),
            result(ProviderKind::Local, "llama2", 1, 0.0, 10, "c"),
        ];
        let summary = CostSummary::from_results(&results);

        assert_eq!(summary.request_count, 3);
        assert_eq!(summary.total_cost, 0.06);
        assert_eq!(summary.by_provider[&ProviderKind::HostedKey].requests, 2);
        assert_eq!(summary.by_provider[&ProviderKind::HostedKey].cost, 0.06);
        assert_eq!(summary.by_model["local/llama2"].cost, 0.0);
        assert_eq!(summary.currency, "USD");
    }

    #[test]
    fn test_compare_model_costs_cheapest_first() {
        let profiles = ProfileSet::from_config(&Default::default());
        let ranking = compare_model_costs(
            &CostTokenEstimator::default(),
            &profiles,
            &[
                Target::new(ProviderKind::HostedKey, "gpt-4"),
                Target::new(ProviderKind::Local, "llama2"),
                Target::new(ProviderKind::HostedKey, "gpt-3.5-turbo"),
            ],
            1000,
        );

        assert_eq!(ranking[0].provider, ProviderKind::Local);
        assert_eq!(ranking[0].cost, 0.0);
        assert_eq!(ranking[1].model, "gpt-3.5-turbo");
        assert_eq!(ranking[2].model, "gpt-4");
        assert_eq!(ranking[2].cost, 0.045);
    }
}
