//! Result normalizer — merges adapter output, estimator output and timing
//! into one [`CanonicalResult`]. Pure: no I/O, no clock, no randomness.

use chrono::{DateTime, Utc};

use openmon_core::types::{
    CanonicalRequest, CanonicalResult, CostBreakdown, ResultStatus, RetryRecord, TokenUsage,
    UsageSource,
};
use openmon_providers::error::ProviderError;
use openmon_providers::traits::RawCompletion;

use crate::estimator::EstimatorOutput;

/// What the adapter produced for one target.
#[derive(Clone, Debug)]
pub struct AdapterResult {
    pub request: CanonicalRequest,
    pub outcome: Result<RawCompletion, ProviderError>,
}

/// Identity and timing metadata captured by the coordinator.
#[derive(Clone, Debug)]
pub struct Timing {
    pub request_id: String,
    pub replayed_at: DateTime<Utc>,
    pub latency_ms: u64,
    pub retry_attempts: u32,
    pub retry_history: Vec<RetryRecord>,
}

/// Build the canonical result.
///
/// Failures carry empty text and zero usage/cost; their error detail comes
/// from the adapter's classified error.
pub fn normalize(adapter: &AdapterResult, estimate: &EstimatorOutput, timing: &Timing) -> CanonicalResult {
    let request = &adapter.request;

    let (status, completion_text, usage, usage_source, cost, finish_reason, error) =
        match &adapter.outcome {
            Ok(raw) => (
                ResultStatus::Success,
                raw.text.clone(),
                estimate.usage,
                estimate.source,
                estimate.cost.clone(),
                raw.finish_reason.clone(),
                None,
            ),
            Err(e) => (
                e.code.status(),
                String::new(),
                TokenUsage::default(),
                UsageSource::Estimated,
                CostBreakdown::zero(),
                None,
                Some(e.to_result_error()),
            ),
        };

    CanonicalResult {
        request_id: timing.request_id.clone(),
        target: request.target(),
        status,
        completion_text,
        token_usage: usage,
        usage_source,
        cost,
        latency_ms: timing.latency_ms,
        retry_attempts: timing.retry_attempts,
        retry_history: timing.retry_history.clone(),
        error,
        finish_reason,
        prompt: request.prompt.clone(),
        system_message: request.system_message.clone(),
        parameters: request.parameters.clone(),
        replayed_at: timing.replayed_at,
        original_log_id: None,
        is_replay: true,
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use openmon_core::types::{ErrorCode, ProviderKind};

    fn timing() -> Timing {
        Timing {
            request_id: "req-1".to_string(),
            replayed_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            latency_ms: 420,
            retry_attempts: 1,
            retry_history: vec![RetryRecord {
                attempt: 1,
                timestamp: DateTime::parse_from_rfc3339("2024-05-01T11:59:59Z")
                    .unwrap()
                    .with_timezone(&Utc),
                error: "connection reset".to_string(),
                code: ErrorCode::Network,
                latency_ms: 12,
            }],
        }
    }

    fn estimate() -> EstimatorOutput {
        EstimatorOutput {
            usage: TokenUsage::new(12, 8),
            cost: CostBreakdown::from_components(0.0004, 0.0005),
            source: UsageSource::Reported,
        }
    }

    fn success() -> AdapterResult {
        AdapterResult {
            request: CanonicalRequest::new(ProviderKind::HostedKey, "gpt-4", "hello")
                .with_system_message("sys"),
            outcome: Ok(RawCompletion {
                text: "hi there".to_string(),
                finish_reason: Some("stop".to_string()),
                usage: None,
                provider_model: None,
            }),
        }
    }

    #[test]
    fn test_normalize_success() {
        let result = normalize(&success(), &estimate(), &timing());

        assert!(result.is_success());
        assert_eq!(result.completion_text, "hi there");
        assert_eq!(result.token_usage.total_tokens(), 20);
        assert_eq!(result.cost.total_cost, 0.0009);
        assert_eq!(result.target.to_string(), "hosted-key/gpt-4");
        assert_eq!(result.system_message.as_deref(), Some("sys"));
        assert_eq!(result.retry_attempts, 1);
        assert!(result.error.is_none());
        assert!(result.is_replay);
    }

    #[test]
    fn test_normalize_failure_zeroes_usage() {
        let adapter = AdapterResult {
            outcome: Err(ProviderError::http(ErrorCode::RateLimited, 429, "slow down")),
            ..success()
        };
        let result = normalize(&adapter, &estimate(), &timing());

        assert_eq!(result.status, ResultStatus::RateLimited);
        assert!(result.completion_text.is_empty());
        assert_eq!(result.token_usage, TokenUsage::default());
        assert!(result.cost.is_zero());
        let err = result.error.unwrap();
        assert_eq!(err.code, ErrorCode::RateLimited);
        assert_eq!(err.http_status, Some(429));
    }

    #[test]
    fn test_normalize_status_per_code() {
        for (code, status) in [
            (ErrorCode::Timeout, ResultStatus::Timeout),
            (ErrorCode::Authentication, ResultStatus::Error),
            (ErrorCode::Validation, ResultStatus::Error),
            (ErrorCode::Network, ResultStatus::Error),
        ] {
            let adapter = AdapterResult {
                outcome: Err(ProviderError::new(code, "x")),
                ..success()
            };
            assert_eq!(normalize(&adapter, &EstimatorOutput::empty(), &timing()).status, status);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let (a, e, t) = (success(), estimate(), timing());
        let first = normalize(&a, &e, &t);
        let second = normalize(&a, &e, &t);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
