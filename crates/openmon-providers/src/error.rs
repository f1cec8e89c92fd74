//! Provider failures and the HTTP error classification table.
//!
//! Adapters never decide retry policy; they only label a failure with an
//! [`ErrorCode`]. The label comes from an ordered rule table so new
//! provider quirks are a data change, not a code change.

use std::ops::RangeInclusive;
use std::time::Duration;

use thiserror::Error;

use openmon_core::types::{ErrorCode, ProviderKind, ResultError};

// ─────────────────────────────────────────────
// ProviderError
// ─────────────────────────────────────────────

/// One failed provider call, already classified.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub code: ErrorCode,
    pub message: String,
    pub http_status: Option<u16>,
}

impl ProviderError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn http(code: ErrorCode, status: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            http_status: Some(status),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Authentication, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("request timed out after {} ms", after.as_millis()),
        )
    }

    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }

    /// Error detail for a canonical result.
    pub fn to_result_error(&self) -> ResultError {
        ResultError {
            message: self.message.clone(),
            code: self.code,
            http_status: self.http_status,
        }
    }
}

/// Map a transport-level reqwest failure.
pub(crate) fn from_reqwest(err: &reqwest::Error, deadline: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(deadline)
    } else if err.is_decode() {
        ProviderError::network(format!("Error parsing provider response: {err}"))
    } else {
        ProviderError::network(format!("Error calling provider: {err}"))
    }
}

// ─────────────────────────────────────────────
// Classification table
// ─────────────────────────────────────────────

/// One row of the classification table.
#[derive(Clone, Debug)]
pub struct ClassificationRule {
    /// `None` applies to every provider.
    pub provider: Option<ProviderKind>,
    pub statuses: RangeInclusive<u16>,
    /// Lowercase substrings; the rule matches when the body contains any.
    /// Empty means the body is not inspected.
    pub body_contains: Vec<String>,
    pub code: ErrorCode,
}

impl ClassificationRule {
    pub fn new(statuses: RangeInclusive<u16>, code: ErrorCode) -> Self {
        Self {
            provider: None,
            statuses,
            body_contains: Vec::new(),
            code,
        }
    }

    pub fn status(status: u16, code: ErrorCode) -> Self {
        Self::new(status..=status, code)
    }

    pub fn for_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn when_body_contains(mut self, needles: &[&str]) -> Self {
        self.body_contains = needles.iter().map(|n| n.to_lowercase()).collect();
        self
    }

    fn matches(&self, provider: ProviderKind, status: u16, body_lower: &str) -> bool {
        self.provider.map_or(true, |p| p == provider)
            && self.statuses.contains(&status)
            && (self.body_contains.is_empty()
                || self.body_contains.iter().any(|n| body_lower.contains(n)))
    }
}

const POLICY_MARKERS: &[&str] = &["content_policy", "content_filter", "safety", "moderation"];

/// Ordered rule table mapping `(provider, status, body)` to an [`ErrorCode`].
///
/// Provider-specific rules are checked before generic ones; within each group
/// the first match wins.
#[derive(Clone, Debug)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        use ErrorCode::*;
        let rules = vec![
            // Provider quirks
            ClassificationRule::status(500, ModelOverloaded)
                .for_provider(ProviderKind::Local)
                .when_body_contains(&["out of memory", "requires more system memory"]),
            ClassificationRule::status(402, Authentication).for_provider(ProviderKind::Aggregator),
            // Generic
            ClassificationRule::new(400..=400, ContentPolicy).when_body_contains(POLICY_MARKERS),
            ClassificationRule::status(403, ContentPolicy).when_body_contains(POLICY_MARKERS),
            ClassificationRule::status(401, Authentication),
            ClassificationRule::status(403, Authentication),
            ClassificationRule::status(429, RateLimited),
            ClassificationRule::status(408, Timeout),
            ClassificationRule::status(504, Timeout),
            ClassificationRule::status(503, ModelOverloaded),
            ClassificationRule::status(529, ModelOverloaded),
            ClassificationRule::status(500, ModelOverloaded).when_body_contains(&["overloaded"]),
            ClassificationRule::status(502, ModelOverloaded).when_body_contains(&["overloaded"]),
            ClassificationRule::new(500..=599, Network),
            ClassificationRule::new(400..=499, Validation),
        ];
        Self { rules }
    }
}

impl ErrorClassifier {
    /// A classifier with no rules; everything falls through to `network`.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule ahead of the existing ones of the same scope.
    pub fn with_rule(mut self, rule: ClassificationRule) -> Self {
        let pos = if rule.provider.is_some() {
            0
        } else {
            self.rules
                .iter()
                .position(|r| r.provider.is_none())
                .unwrap_or(self.rules.len())
        };
        self.rules.insert(pos, rule);
        self
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify a non-2xx response.
    pub fn classify(&self, provider: ProviderKind, status: u16, body: &str) -> ErrorCode {
        let body_lower = body.to_lowercase();
        let scoped = self.rules.iter().filter(|r| r.provider.is_some());
        let generic = self.rules.iter().filter(|r| r.provider.is_none());
        scoped
            .chain(generic)
            .find(|r| r.matches(provider, status, &body_lower))
            .map(|r| r.code)
            .unwrap_or(ErrorCode::Network)
    }

    /// Build a classified error for a non-2xx response.
    pub fn error_for(&self, provider: ProviderKind, status: u16, body: &str) -> ProviderError {
        let code = self.classify(provider, status, body);
        let detail = openmon_core::utils::truncate_string(body.trim(), 500);
        let message = if detail.is_empty() {
            format!("Provider returned HTTP {status}")
        } else {
            format!("Provider returned HTTP {status}: {detail}")
        };
        ProviderError::http(code, status, message)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
