//! Dispatch coordinator — fans one request out to N targets concurrently.
//!
//! Each target runs as its own task with its own deadline and retry policy.
//! A failing, slow or panicking target only affects its own result: the
//! coordinator always returns exactly one result per target.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use openmon_core::config::{Config, RetryConfig};
use openmon_core::types::{CanonicalRequest, CanonicalResult, ErrorCode, Target};
use openmon_core::{EngineError, ValidationError};
use openmon_providers::adapters::AdapterSet;
use openmon_providers::error::ProviderError;
use openmon_providers::profile::{ProfileSet, ProviderProfile};
use openmon_providers::traits::ProviderAdapter;

use crate::estimator::{CostTokenEstimator, EstimatorOutput};
use crate::normalizer::{normalize, AdapterResult, Timing};
use crate::retry::RetryPolicy;

/// Default cap on targets per comparison.
pub const DEFAULT_MAX_TARGETS: usize = 5;

// ─────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────

/// Runs canonical requests against provider adapters.
///
/// Profiles are read through a snapshot taken at dispatch time; updating
/// them never affects calls already in flight.
pub struct Coordinator {
    adapters: Arc<AdapterSet>,
    profiles: RwLock<Arc<ProfileSet>>,
    retry: RetryConfig,
    estimator: CostTokenEstimator,
    max_targets: usize,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("adapters", &self.adapters)
            .field("max_targets", &self.max_targets)
            .finish()
    }
}

impl Coordinator {
    pub fn new(adapters: Arc<AdapterSet>, profiles: ProfileSet) -> Self {
        Self {
            adapters,
            profiles: RwLock::new(Arc::new(profiles)),
            retry: RetryConfig::default(),
            estimator: CostTokenEstimator::default(),
            max_targets: DEFAULT_MAX_TARGETS,
        }
    }

    /// Built-in adapters with profiles, retry and dispatch limits from config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(AdapterSet::with_defaults()),
            ProfileSet::from_config(&config.providers),
        )
        .with_retry(config.retry.clone())
        .with_estimator(CostTokenEstimator::new(config.dispatch.default_completion_chars))
        .with_max_targets(config.dispatch.max_comparison_targets)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_estimator(mut self, estimator: CostTokenEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_max_targets(mut self, max_targets: usize) -> Self {
        self.max_targets = max_targets.max(1);
        self
    }

    pub fn adapters(&self) -> &Arc<AdapterSet> {
        &self.adapters
    }

    pub fn estimator(&self) -> &CostTokenEstimator {
        &self.estimator
    }

    pub fn max_targets(&self) -> usize {
        self.max_targets
    }

    /// Current profile snapshot.
    pub async fn profiles(&self) -> Arc<ProfileSet> {
        Arc::clone(&*self.profiles.read().await)
    }

    /// Replace the profiles used by future dispatches.
    pub async fn update_profiles(&self, profiles: ProfileSet) {
        *self.profiles.write().await = Arc::new(profiles);
        info!("Provider profiles updated");
    }

    /// Run one request against one profile, with retries.
    ///
    /// The request is validated first and must target `profile`'s provider;
    /// otherwise a `validation` result comes back and nothing is sent.
    /// `timeout` bounds each attempt; `None` uses the profile's default.
    pub async fn execute(
        &self,
        request: &CanonicalRequest,
        profile: &ProviderProfile,
        timeout: Option<Duration>,
    ) -> CanonicalResult {
        let request = match request.clone().validated() {
            Ok(request) => request,
            Err(e) => return rejected(request.clone(), ProviderError::validation(e.to_string())),
        };
        if request.provider != profile.kind {
            let message = format!(
                "request for {} cannot run on the {} profile",
                request.provider, profile.kind
            );
            return rejected(request, ProviderError::validation(message));
        }
        let Some(adapter) = self.adapters.get(profile.kind) else {
            return rejected(
                request,
                ProviderError::validation(format!("no adapter registered for {}", profile.kind)),
            );
        };
        let policy = RetryPolicy::from(self.retry.for_provider(profile.kind));
        let deadline = timeout.unwrap_or(profile.default_timeout);
        run_target(adapter, request, profile.clone(), policy, self.estimator, deadline).await
    }

    /// Run `request` against every target concurrently.
    pub async fn dispatch(
        &self,
        request: &CanonicalRequest,
        targets: &[Target],
    ) -> Result<Vec<CanonicalResult>, EngineError> {
        let requests = targets.iter().map(|t| request.for_target(t)).collect();
        self.dispatch_batch(requests).await
    }

    /// Run a batch of per-target requests concurrently.
    ///
    /// Batch rules: at least one request, at most `max_targets`, and unique
    /// `(provider, model)` tags. Each request is validated before anything
    /// is sent.
    pub async fn dispatch_batch(
        &self,
        requests: Vec<CanonicalRequest>,
    ) -> Result<Vec<CanonicalResult>, EngineError> {
        if requests.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        if requests.len() > self.max_targets {
            return Err(ValidationError::TooManyTargets {
                max: self.max_targets,
                got: requests.len(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(requests.len());
        for request in requests {
            let request = request.validated()?;
            let target = request.target();
            if !seen.insert(target.clone()) {
                return Err(ValidationError::DuplicateTarget(target.to_string()).into());
            }
            validated.push(request);
        }

        let profiles = self.profiles().await;
        let expected = validated.len();
        info!(targets = expected, "Dispatching batch");

        let mut results = Vec::with_capacity(expected);
        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, CanonicalRequest> = HashMap::new();

        for request in validated {
            let kind = request.provider;
            let Some(profile) = profiles.get(kind) else {
                results.push(rejected(
                    request,
                    ProviderError::validation(format!("no profile configured for {kind}")),
                ));
                continue;
            };
            let Some(adapter) = self.adapters.get(kind) else {
                results.push(rejected(
                    request,
                    ProviderError::validation(format!("no adapter registered for {kind}")),
                ));
                continue;
            };

            let policy = RetryPolicy::from(self.retry.for_provider(kind));
            let deadline = profile.default_timeout;
            let handle = tasks.spawn(run_target(
                adapter,
                request.clone(),
                profile.clone(),
                policy,
                self.estimator,
                deadline,
            ));
            in_flight.insert(handle.id(), request);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    in_flight.remove(&id);
                    results.push(result);
                }
                Err(join_error) => {
                    let Some(request) = in_flight.remove(&join_error.id()) else {
                        return Err(EngineError::Internal(format!(
                            "finished task {} has no target",
                            join_error.id()
                        )));
                    };
                    error!(tag = %request.target(), error = %join_error, "Dispatch task failed");
                    results.push(rejected(
                        request,
                        ProviderError::new(
                            ErrorCode::Internal,
                            format!("provider task failed: {join_error}"),
                        ),
                    ));
                }
            }
        }

        if results.len() != expected {
            return Err(EngineError::Internal(format!(
                "expected {expected} results, collected {}",
                results.len()
            )));
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(targets = expected, succeeded, "Batch complete");
        Ok(results)
    }
}

// ─────────────────────────────────────────────
// Per-target execution
// ─────────────────────────────────────────────

/// Preflight, retry-wrapped send, reconcile, normalize.
async fn run_target(
    adapter: Arc<dyn ProviderAdapter>,
    request: CanonicalRequest,
    profile: ProviderProfile,
    policy: RetryPolicy,
    estimator: CostTokenEstimator,
    deadline: Duration,
) -> CanonicalResult {
    let request_id = Uuid::new_v4().to_string();
    let replayed_at = Utc::now();
    let started = Instant::now();

    debug!(
        request_id = %request_id,
        provider = adapter.display_name(),
        model = %request.model,
        deadline_ms = deadline.as_millis() as u64,
        "Executing target"
    );

    let (outcome, retry_attempts, retry_history) = match adapter.preflight(&request, &profile) {
        Err(e) => {
            debug!(request_id = %request_id, code = %e.code, "Rejected before sending");
            (Err(e), 0, Vec::new())
        }
        Ok(()) => {
            let run = policy
                .run(|_attempt| adapter.send(&request, &profile, deadline))
                .await;
            (run.result, run.retries, run.history)
        }
    };

    let latency_ms = started.elapsed().as_millis() as u64;
    let estimate = match &outcome {
        Ok(raw) => estimator.reconcile(&request, &profile, raw.usage.as_ref(), &raw.text),
        Err(_) => EstimatorOutput::empty(),
    };

    let timing = Timing {
        request_id,
        replayed_at,
        latency_ms,
        retry_attempts,
        retry_history,
    };
    let result = normalize(&AdapterResult { request, outcome }, &estimate, &timing);

    match &result.error {
        None => info!(
            tag = %result.target,
            latency_ms,
            tokens = result.token_usage.total_tokens(),
            cost = result.cost.total_cost,
            "Target succeeded"
        ),
        Some(err) => info!(
            tag = %result.target,
            latency_ms,
            code = %err.code,
            retries = result.retry_attempts,
            "Target failed"
        ),
    }
    result
}

/// A result for a target that was never sent.
fn rejected(request: CanonicalRequest, error: ProviderError) -> CanonicalResult {
    let timing = Timing {
        request_id: Uuid::new_v4().to_string(),
        replayed_at: Utc::now(),
        latency_ms: 0,
        retry_attempts: 0,
        retry_history: Vec::new(),
    };
    normalize(
        &AdapterResult {
            request,
            outcome: Err(error),
        },
        &EstimatorOutput::empty(),
        &timing,
    )
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use openmon_core::config::{ProviderSettings, RetrySettings};
    use openmon_core::types::{ProviderKind, ResultStatus, UsageSource};
    use openmon_providers::traits::RawCompletion;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig::uniform(RetrySettings {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        })
    }

    fn profile(kind: ProviderKind, api_key: &str, api_base: &str) -> ProviderProfile {
        let settings = ProviderSettings {
            api_key: api_key.to_string(),
            api_base: Some(api_base.to_string()),
            ..Default::default()
        };
        ProviderProfile::for_kind(kind, &settings)
    }

    fn coordinator(profiles: ProfileSet) -> Coordinator {
        Coordinator::new(Arc::new(AdapterSet::with_defaults()), profiles).with_retry(fast_retry(2))
    }

    async fn mock_ollama(reply: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama2",
                "response": reply,
                "done": true
            })))
            .mount(&server)
            .await;
        server
    }

    /// Adapter stub with scripted behavior, for failure modes HTTP can't express.
    struct ScriptedAdapter {
        kind: ProviderKind,
        calls: AtomicU32,
        panic: bool,
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn display_name(&self) -> &str {
            "Scripted"
        }

        async fn send(
            &self,
            _request: &CanonicalRequest,
            _profile: &ProviderProfile,
            _timeout: Duration,
        ) -> Result<RawCompletion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("adapter bug");
            }
            Err(ProviderError::http(ErrorCode::RateLimited, 429, "rate limited"))
        }

        async fn list_models(
            &self,
            _profile: &ProviderProfile,
            _timeout: Duration,
        ) -> Result<Vec<String>, ProviderError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_local_replay_succeeds_with_zero_cost() {
        let server = mock_ollama("The capital of France is Paris.").await;
        let coord = coordinator(
            ProfileSet::new().with_profile(profile(ProviderKind::Local, "", &server.uri())),
        );

        let request = CanonicalRequest::new(
            ProviderKind::Local,
            "llama2",
            "What is the capital of France?",
        )
        .with_parameters(openmon_core::types::GenerationParams {
            temperature: 0.7,
            max_tokens: Some(100),
            ..Default::default()
        });

        let results = coord
            .dispatch(&request, &[Target::new(ProviderKind::Local, "llama2")])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.status, ResultStatus::Success);
        assert_eq!(result.cost.total_cost, 0.0);
        assert!(result.token_usage.total_tokens() > 0);
        assert_eq!(result.usage_source, UsageSource::Estimated);
        assert_eq!(result.parameters.temperature, 0.7);
    }

    #[tokio::test]
    async fn test_invalid_credential_does_not_affect_sibling() {
        let hosted = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .expect(1)
            .mount(&hosted)
            .await;
        let local = mock_ollama("Paris").await;

        let coord = coordinator(
            ProfileSet::new()
                .with_profile(profile(ProviderKind::HostedKey, "sk-bad", &hosted.uri()))
                .with_profile(profile(ProviderKind::Local, "", &local.uri())),
        );

        let request = CanonicalRequest::new(ProviderKind::HostedKey, "gpt-4", "Capital of France?");
        let results = coord
            .dispatch(
                &request,
                &[
                    Target::new(ProviderKind::HostedKey, "gpt-4"),
                    Target::new(ProviderKind::Local, "llama2"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        let by_target: HashMap<Target, &CanonicalResult> =
            results.iter().map(|r| (r.target.clone(), r)).collect();

        let hosted_result = by_target[&Target::new(ProviderKind::HostedKey, "gpt-4")];
        assert_eq!(hosted_result.status, ResultStatus::Error);
        assert_eq!(hosted_result.error_code(), Some(ErrorCode::Authentication));
        assert_eq!(hosted_result.retry_attempts, 0);

        let local_result = by_target[&Target::new(ProviderKind::Local, "llama2")];
        assert_eq!(local_result.status, ResultStatus::Success);
    }

    #[tokio::test]
    async fn test_every_target_fails_still_n_results() {
        let coord = coordinator(
            ProfileSet::new()
                .with_profile(profile(ProviderKind::HostedKey, "", "http://127.0.0.1:1"))
                .with_profile(profile(ProviderKind::Local, "", "http://127.0.0.1:1"))
                .with_profile(profile(ProviderKind::SecondaryHosted, "k", "http://127.0.0.1:1")),
        );

        let request = CanonicalRequest::new(ProviderKind::Local, "llama2", "hi");
        let targets = [
            Target::new(ProviderKind::HostedKey, "gpt-4"),
            Target::new(ProviderKind::Local, "llama2"),
            Target::new(ProviderKind::SecondaryHosted, "mistral-small"),
        ];
        let results = coord.dispatch(&request, &targets).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.is_success()));
        let tags: HashSet<Target> = results.iter().map(|r| r.target.clone()).collect();
        assert_eq!(tags.len(), 3);
        assert!(targets.iter().all(|t| tags.contains(t)));
    }

    #[tokio::test]
    async fn test_rate_limited_exhausts_retries() {
        let adapter = Arc::new(ScriptedAdapter {
            kind: ProviderKind::Aggregator,
            calls: AtomicU32::new(0),
            panic: false,
        });
        let mut adapters = AdapterSet::new();
        adapters.register(adapter.clone());

        let coord = Coordinator::new(
            Arc::new(adapters),
            ProfileSet::new().with_profile(profile(ProviderKind::Aggregator, "sk-or", "http://unused")),
        )
        .with_retry(fast_retry(3));

        let request = CanonicalRequest::new(ProviderKind::Aggregator, "openai/gpt-4", "hi");
        let results = coord.dispatch(&request, &[request.target()]).await.unwrap();

        let result = &results[0];
        assert_eq!(result.status, ResultStatus::RateLimited);
        assert_eq!(result.retry_attempts, 3);
        assert_eq!(result.retry_history.len(), 4);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_contained() {
        let mut adapters = AdapterSet::with_defaults();
        adapters.register(Arc::new(ScriptedAdapter {
            kind: ProviderKind::HostedKey,
            calls: AtomicU32::new(0),
            panic: true,
        }));
        let local = mock_ollama("still here").await;

        let coord = Coordinator::new(
            Arc::new(adapters),
            ProfileSet::new()
                .with_profile(profile(ProviderKind::HostedKey, "k", "http://unused"))
                .with_profile(profile(ProviderKind::Local, "", &local.uri())),
        );

        let request = CanonicalRequest::new(ProviderKind::HostedKey, "gpt-4", "hi");
        let results = coord
            .dispatch(
                &request,
                &[
                    Target::new(ProviderKind::HostedKey, "gpt-4"),
                    Target::new(ProviderKind::Local, "llama2"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        let panicked = results
            .iter()
            .find(|r| r.target.provider == ProviderKind::HostedKey)
            .unwrap();
        assert_eq!(panicked.error_code(), Some(ErrorCode::Internal));
        assert!(results
            .iter()
            .any(|r| r.target.provider == ProviderKind::Local && r.is_success()));
    }

    #[tokio::test]
    async fn test_unsupported_model_fails_fast() {
        let hosted = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&hosted)
            .await;

        let coord = coordinator(
            ProfileSet::new().with_profile(profile(ProviderKind::HostedKey, "k", &hosted.uri())),
        );
        let request = CanonicalRequest::new(ProviderKind::HostedKey, "not-a-model", "hi");
        let results = coord.dispatch(&request, &[request.target()]).await.unwrap();

        assert_eq!(results[0].error_code(), Some(ErrorCode::Validation));
        assert_eq!(results[0].retry_attempts, 0);
    }

    #[tokio::test]
    async fn test_disabled_provider_is_validation_result() {
        let mut disabled = profile(ProviderKind::Local, "", "http://127.0.0.1:1");
        disabled.enabled = false;
        let coord = coordinator(ProfileSet::new().with_profile(disabled));

        let request = CanonicalRequest::new(ProviderKind::Local, "llama2", "hi");
        let results = coord.dispatch(&request, &[request.target()]).await.unwrap();
        assert_eq!(results[0].error_code(), Some(ErrorCode::Validation));
    }

    #[tokio::test]
    async fn test_missing_profile_is_validation_result() {
        let coord = coordinator(ProfileSet::new());
        let request = CanonicalRequest::new(ProviderKind::Local, "llama2", "hi");
        let results = coord.dispatch(&request, &[request.target()]).await.unwrap();
        assert_eq!(results[0].error_code(), Some(ErrorCode::Validation));
    }

    #[tokio::test]
    async fn test_batch_validation() {
        let coord = coordinator(ProfileSet::new()).with_max_targets(2);
        let request = CanonicalRequest::new(ProviderKind::Local, "llama2", "hi");

        let err = coord.dispatch(&request, &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::EmptyBatch)));

        let three = [
            Target::new(ProviderKind::Local, "llama2"),
            Target::new(ProviderKind::Local, "phi3"),
            Target::new(ProviderKind::Local, "gemma"),
        ];
        let err = coord.dispatch(&request, &three).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::TooManyTargets { max: 2, got: 3 })
        ));

        let dupes = [
            Target::new(ProviderKind::Local, "llama2"),
            Target::new(ProviderKind::Local, "llama2"),
        ];
        let err = coord.dispatch(&request, &dupes).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::DuplicateTarget(_))));

        let blank = CanonicalRequest::new(ProviderKind::Local, "llama2", "   ");
        let err = coord.dispatch(&blank, &[blank.target()]).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_slow_target_times_out_alone() {
        let slow = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "choices": [{ "message": { "content": "late" }, "finish_reason": "stop" }]
                    }))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&slow)
            .await;
        let local = mock_ollama("fast").await;

        let coord = Coordinator::new(
            Arc::new(AdapterSet::with_defaults()),
            ProfileSet::new()
                .with_profile(
                    profile(ProviderKind::HostedKey, "k", &slow.uri())
                        .with_timeout(Duration::from_millis(100)),
                )
                .with_profile(profile(ProviderKind::Local, "", &local.uri())),
        )
        .with_retry(fast_retry(0));

        let request = CanonicalRequest::new(ProviderKind::HostedKey, "gpt-4", "hi");
        let results = coord
            .dispatch(
                &request,
                &[
                    Target::new(ProviderKind::HostedKey, "gpt-4"),
                    Target::new(ProviderKind::Local, "llama2"),
                ],
            )
            .await
            .unwrap();

        let timed_out = results
            .iter()
            .find(|r| r.target.provider == ProviderKind::HostedKey)
            .unwrap();
        assert_eq!(timed_out.status, ResultStatus::Timeout);
        assert!(results
            .iter()
            .any(|r| r.target.provider == ProviderKind::Local && r.is_success()));
    }

    #[tokio::test]
    async fn test_execute_reports_usage_and_cost() {
        let hosted = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "Paris" }, "finish_reason": "stop" }],
                "usage": { "prompt_tokens": 1000, "completion_tokens": 1000, "total_tokens": 2000 }
            })))
            .mount(&hosted)
            .await;

        let coord = coordinator(ProfileSet::new());
        let hosted_profile = profile(ProviderKind::HostedKey, "k", &hosted.uri());
        let request = CanonicalRequest::new(ProviderKind::HostedKey, "gpt-3.5-turbo", "hi");
        let result = coord.execute(&request, &hosted_profile, None).await;

        assert!(result.is_success());
        assert_eq!(result.usage_source, UsageSource::Reported);
        assert_eq!(result.token_usage.total_tokens(), 2000);
        assert_eq!(result.cost.prompt_cost, 0.0015);
        assert_eq!(result.cost.completion_cost, 0.002);
        assert_eq!(result.cost.total_cost, 0.0035);
        assert!(!result.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_request_without_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama2",
                "response": "should not be sent",
                "done": true
            })))
            .expect(0)
            .mount(&server)
            .await;

        let coord = coordinator(ProfileSet::new());
        let local = profile(ProviderKind::Local, "", &server.uri());

        let blank = CanonicalRequest::new(ProviderKind::Local, "llama2", "   ");
        let result = coord.execute(&blank, &local, None).await;
        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.error_code(), Some(ErrorCode::Validation));

        let zero_cap = CanonicalRequest::new(ProviderKind::Local, "llama2", "hi").with_parameters(
            openmon_core::types::GenerationParams {
                max_tokens: Some(0),
                ..Default::default()
            },
        );
        let result = coord.execute(&zero_cap, &local, None).await;
        assert_eq!(result.error_code(), Some(ErrorCode::Validation));
        assert_eq!(result.retry_attempts, 0);
    }

    #[tokio::test]
    async fn test_execute_clamps_parameters_before_sending() {
        let server = mock_ollama("ok").await;
        let coord = coordinator(ProfileSet::new());
        let local = profile(ProviderKind::Local, "", &server.uri());
        let request = CanonicalRequest::new(ProviderKind::Local, "llama2", "hi").with_parameters(
            openmon_core::types::GenerationParams {
                temperature: 7.5,
                top_p: 3.0,
                ..Default::default()
            },
        );

        let result = coord.execute(&request, &local, None).await;
        assert!(result.is_success());
        assert_eq!(result.parameters.temperature, 2.0);
        assert_eq!(result.parameters.top_p, 1.0);

        let sent = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&sent[0].body).unwrap();
        assert_eq!(body["options"]["temperature"], 2.0);
        assert_eq!(body["options"]["top_p"], 1.0);
    }

    #[tokio::test]
    async fn test_execute_rejects_provider_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let coord = coordinator(ProfileSet::new());
        let local = profile(ProviderKind::Local, "", &server.uri());
        let request = CanonicalRequest::new(ProviderKind::HostedKey, "gpt-4", "hi");

        let result = coord.execute(&request, &local, None).await;
        assert_eq!(result.error_code(), Some(ErrorCode::Validation));
        assert_eq!(result.target, Target::new(ProviderKind::HostedKey, "gpt-4"));
    }

    #[tokio::test]
    async fn test_update_profiles() {
        let coord = coordinator(ProfileSet::new());
        assert!(coord.profiles().await.is_empty());

        coord
            .update_profiles(ProfileSet::new().with_profile(profile(ProviderKind::Local, "", "http://x")))
            .await;
        assert_eq!(coord.profiles().await.len(), 1);
    }
}
