//! Adapter for OpenAI-compatible `/chat/completions` APIs.
//!
//! Covers the hosted-key (OpenAI), aggregator (OpenRouter) and
//! secondary-hosted (Mistral) families. Family quirks (attribution headers,
//! unsupported penalty parameters) come from the profile.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use openmon_core::types::{CanonicalRequest, ProviderKind};

use crate::error::{ErrorClassifier, ProviderError};
use crate::http::HttpTransport;
use crate::profile::ProviderProfile;
use crate::registry::find_by_kind;
use crate::traits::{ProviderAdapter, RawCompletion, RawUsage};

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

// ─────────────────────────────────────────────
// ChatCompletionsAdapter
// ─────────────────────────────────────────────

/// Adapter for any OpenAI-compatible chat completions endpoint.
pub struct ChatCompletionsAdapter {
    kind: ProviderKind,
    transport: HttpTransport,
    classifier: Arc<ErrorClassifier>,
}

impl std::fmt::Debug for ChatCompletionsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsAdapter")
            .field("provider", &self.display_name())
            .finish()
    }
}

impl ChatCompletionsAdapter {
    pub fn new(kind: ProviderKind, transport: HttpTransport, classifier: Arc<ErrorClassifier>) -> Self {
        Self {
            kind,
            transport,
            classifier,
        }
    }

    fn build_body<'a>(
        request: &'a CanonicalRequest,
        profile: &ProviderProfile,
    ) -> ChatCompletionRequest<'a> {
        let params = &request.parameters;

        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system_message {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let (frequency_penalty, presence_penalty) = if profile.supports_penalties {
            (Some(params.frequency_penalty), Some(params.presence_penalty))
        } else {
            (None, None)
        };

        ChatCompletionRequest {
            model: &request.model,
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            frequency_penalty,
            presence_penalty,
            stop: (!params.stop_sequences.is_empty()).then_some(params.stop_sequences.as_slice()),
            stream: false,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ChatCompletionsAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn display_name(&self) -> &str {
        find_by_kind(self.kind).display_name
    }

    async fn send(
        &self,
        request: &CanonicalRequest,
        profile: &ProviderProfile,
        timeout: Duration,
    ) -> Result<RawCompletion, ProviderError> {
        debug!(
            provider = self.display_name(),
            model = %request.model,
            has_system = request.system_message.is_some(),
            "Calling chat completions"
        );

        let body = Self::build_body(request, profile);
        let response: ChatCompletionResponse = self
            .transport
            .post_json(profile, "/chat/completions", &body, timeout, &self.classifier)
            .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::network("No choices in response"))?;

        let completion = RawCompletion {
            text: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: response.usage.map(|u| RawUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            provider_model: response.model,
        };

        debug!(
            provider = self.display_name(),
            chars = completion.text.len(),
            finish_reason = completion.finish_reason.as_deref().unwrap_or("?"),
            reported_usage = completion.usage.is_some(),
            "Completion received"
        );
        Ok(completion)
    }

    async fn list_models(
        &self,
        profile: &ProviderProfile,
        timeout: Duration,
    ) -> Result<Vec<String>, ProviderError> {
        let list: ModelList = self
            .transport
            .get_json(profile, &profile.models_path, timeout, &self.classifier)
            .await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
