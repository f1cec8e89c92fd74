//! Provider adapter trait — the seam between the engine and each wire protocol.
//!
//! Every provider family implements this trait. The chat-completions adapter
//! in `chat.rs` covers OpenAI, OpenRouter and Mistral; `ollama.rs` covers the
//! local runtime.

use std::time::Duration;

use async_trait::async_trait;

use openmon_core::types::{CanonicalRequest, ProviderKind};

use crate::error::ProviderError;
use crate::profile::ProviderProfile;

/// Token counts as reported by the provider. Any field may be missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// A successful provider reply, before normalization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawCompletion {
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: Option<RawUsage>,
    /// Model name echoed by the provider, when it differs from the request.
    pub provider_model: Option<String>,
}

/// Trait that all provider adapters implement.
///
/// Adapters are stateless with respect to a request: every call receives the
/// profile and deadline it should use. Failures come back classified; the
/// adapter never retries.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider kind this adapter speaks for.
    fn kind(&self) -> ProviderKind;

    /// Display name for logging.
    fn display_name(&self) -> &str;

    /// Checks that need no network: enabled flag, credential, model support.
    fn preflight(
        &self,
        request: &CanonicalRequest,
        profile: &ProviderProfile,
    ) -> Result<(), ProviderError> {
        if !profile.enabled {
            return Err(ProviderError::validation(format!(
                "provider {} is disabled",
                profile.kind
            )));
        }
        if profile.missing_credential() {
            return Err(ProviderError::authentication(format!(
                "no API key configured for {}",
                profile.display_name
            )));
        }
        if !profile.supports_model(&request.model) {
            return Err(ProviderError::validation(format!(
                "model '{}' is not supported by provider {}",
                request.model, profile.kind
            )));
        }
        Ok(())
    }

    /// Send one generation request and wait at most `timeout`.
    async fn send(
        &self,
        request: &CanonicalRequest,
        profile: &ProviderProfile,
        timeout: Duration,
    ) -> Result<RawCompletion, ProviderError>;

    /// List model ids the provider currently serves.
    async fn list_models(
        &self,
        profile: &ProviderProfile,
        timeout: Duration,
    ) -> Result<Vec<String>, ProviderError>;
}
