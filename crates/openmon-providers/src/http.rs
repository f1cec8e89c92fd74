//! Shared HTTP transport: one pooled client, per-call deadlines, and
//! classified failures.

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use openmon_core::types::ProviderKind;

use crate::error::{from_reqwest, ErrorClassifier, ProviderError};
use crate::profile::ProviderProfile;
use crate::registry::AuthScheme;

/// Connection-pooled HTTP client shared by the adapters.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        // Deadlines are applied per call, so the client carries no global timeout.
        let client = reqwest::Client::builder()
            .user_agent(concat!("openmon/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// POST a JSON body and decode a JSON reply.
    pub async fn post_json<B, T>(
        &self,
        profile: &ProviderProfile,
        path: &str,
        body: &B,
        deadline: Duration,
        classifier: &ErrorClassifier,
    ) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = profile.endpoint(path);
        let builder = self.authorized(self.client.post(&url), profile).json(body);
        execute(builder, profile.kind, &url, deadline, classifier).await
    }

    /// GET and decode a JSON reply.
    pub async fn get_json<T>(
        &self,
        profile: &ProviderProfile,
        path: &str,
        deadline: Duration,
        classifier: &ErrorClassifier,
    ) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        let url = profile.endpoint(path);
        let builder = self.authorized(self.client.get(&url), profile);
        execute(builder, profile.kind, &url, deadline, classifier).await
    }

    fn authorized(&self, builder: RequestBuilder, profile: &ProviderProfile) -> RequestBuilder {
        let builder = builder.headers(profile.headers.clone());
        match profile.auth {
            AuthScheme::Bearer => builder.bearer_auth(profile.api_key()),
            AuthScheme::None => builder,
        }
    }
}

async fn execute<T: DeserializeOwned>(
    builder: RequestBuilder,
    provider: ProviderKind,
    url: &str,
    deadline: Duration,
    classifier: &ErrorClassifier,
) -> Result<T, ProviderError> {
    let call = async {
        let response = builder
            .send()
            .await
            .map_err(|e| from_reqwest(&e, deadline))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(provider = %provider, status = %status, body = %body, "API error");
            return Err(classifier.error_for(provider, status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::network(format!("Error parsing provider response: {e}")))
    };

    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            debug!(provider = %provider, url = %url, "Provider call exceeded deadline");
            Err(ProviderError::timeout(deadline))
        }
    }
}
