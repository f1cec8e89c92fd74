//! Adapter for a local Ollama runtime (`/api/generate`, `/api/tags`).
//!
//! Ollama takes a single prompt string, so the system message is folded into
//! it. Token counts come back as `prompt_eval_count` / `eval_count`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use openmon_core::types::{CanonicalRequest, ProviderKind};

use crate::error::{ErrorClassifier, ProviderError};
use crate::http::HttpTransport;
use crate::profile::ProviderProfile;
use crate::traits::{ProviderAdapter, RawCompletion, RawUsage};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Fold an optional system message into the single Ollama prompt.
pub fn compose_prompt(system: Option<&str>, prompt: &str) -> String {
    match system {
        Some(system) if !system.is_empty() => format!("System: {system}\n\nUser: {prompt}"),
        _ => prompt.to_string(),
    }
}

/// Adapter for a local Ollama server.
#[derive(Debug)]
pub struct OllamaAdapter {
    transport: HttpTransport,
    classifier: Arc<ErrorClassifier>,
}

impl OllamaAdapter {
    pub fn new(transport: HttpTransport, classifier: Arc<ErrorClassifier>) -> Self {
        Self {
            transport,
            classifier,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn display_name(&self) -> &str {
        "Ollama"
    }

    async fn send(
        &self,
        request: &CanonicalRequest,
        profile: &ProviderProfile,
        timeout: Duration,
    ) -> Result<RawCompletion, ProviderError> {
        let params = &request.parameters;
        let nonzero = |v: f64| (v != 0.0).then_some(v);

        let body = GenerateRequest {
            model: &request.model,
            prompt: compose_prompt(request.system_message.as_deref(), &request.prompt),
            stream: false,
            options: GenerateOptions {
                temperature: params.temperature,
                top_p: params.top_p,
                num_predict: params.max_tokens,
                frequency_penalty: nonzero(params.frequency_penalty),
                presence_penalty: nonzero(params.presence_penalty),
                stop: (!params.stop_sequences.is_empty())
                    .then_some(params.stop_sequences.as_slice()),
            },
        };

        debug!(model = %request.model, base = %profile.api_base, "Calling Ollama generate");

        let response: GenerateResponse = self
            .transport
            .post_json(profile, "/api/generate", &body, timeout, &self.classifier)
            .await?;

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (None, None) => None,
            (prompt_tokens, completion_tokens) => Some(RawUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: None,
            }),
        };

        let finish_reason = response
            .done_reason
            .or_else(|| Some(if response.done { "stop" } else { "length" }.to_string()));

        Ok(RawCompletion {
            text: response.response,
            finish_reason,
            usage,
            provider_model: response.model,
        })
    }

    async fn list_models(
        &self,
        profile: &ProviderProfile,
        timeout: Duration,
    ) -> Result<Vec<String>, ProviderError> {
        let tags: TagList = self
            .transport
            .get_json(profile, &profile.models_path, timeout, &self.classifier)
            .await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
