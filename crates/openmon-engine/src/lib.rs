//! Replay & multi-provider orchestration engine for openmon.
//!
//! # Architecture
//!
//! - [`replay::ReplayEngine`] — replay, replay-from-log, compare, stream, estimate, probe
//! - [`dispatch::Coordinator`] — concurrent fan-out, one task per target
//! - [`retry::RetryPolicy`] — bounded exponential backoff for transient failures
//! - [`estimator::CostTokenEstimator`] — token heuristics and pricing
//! - [`normalizer`] — builds the canonical result
//! - [`metrics`] — comparison rankings, retry analysis, cost summaries

pub mod dispatch;
pub mod estimator;
pub mod metrics;
pub mod normalizer;
pub mod replay;
pub mod retry;

pub use dispatch::{Coordinator, DEFAULT_MAX_TARGETS};
pub use estimator::{CostEstimate, CostTokenEstimator, EstimatorOutput};
pub use metrics::{
    analyze_retries, compare_model_costs, ComparisonMetrics, ComparisonReport, CostSummary,
    ModelCostComparison, RankEntry, RetryAnalysis,
};
pub use replay::{
    CompareInput, CompareTarget, EstimateInput, ParamOverrides, ReplayEngine, ReplayEvent,
    ReplayInput, ReplayOverrides, StoredPrompt,
};
pub use retry::{RetryOutcome, RetryPolicy};
