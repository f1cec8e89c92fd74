//! Core types for openmon — the canonical request/result model shared by the
//! provider adapters, the replay engine, and the CLI.
//!
//! # Layout
//!
//! - [`types`] — canonical request, result, token usage, cost, error codes
//! - [`error`] — validation and engine error enums
//! - [`config`] — JSON config schema, loader, env var overrides
//! - [`utils`] — paths, rounding, string helpers

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use error::{EngineError, ValidationError};
pub use types::{
    CanonicalRequest, CanonicalResult, CostBreakdown, ErrorCode, GenerationParams, ProviderKind,
    ResultError, ResultStatus, RetryRecord, Target, TokenUsage, UsageSource,
};
