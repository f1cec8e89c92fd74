//! Provider layer for openmon.
//!
//! Talks directly to each provider's HTTP API and hands the engine raw,
//! classified outcomes.
//!
//! # Architecture
//!
//! - [`traits::ProviderAdapter`] — trait that every provider family implements
//! - [`registry`] — static specs for the four supported families
//! - [`profile`] — specs merged with user settings; pricing tables
//! - [`error`] — `ProviderError` and the HTTP error classification table
//! - [`chat::ChatCompletionsAdapter`] — OpenAI-compatible chat completions
//! - [`ollama::OllamaAdapter`] — local Ollama runtime
//! - [`adapters::AdapterSet`] — adapter lookup by provider kind
//! - [`prober::ConnectionProber`] — reachability/auth checks and model listing

pub mod adapters;
pub mod chat;
pub mod error;
pub mod http;
pub mod ollama;
pub mod prober;
pub mod profile;
pub mod registry;
pub mod traits;

// Re-export main types for convenience
pub use adapters::AdapterSet;
pub use chat::ChatCompletionsAdapter;
pub use error::{ClassificationRule, ErrorClassifier, ProviderError};
pub use http::HttpTransport;
pub use ollama::OllamaAdapter;
pub use prober::{ConnectionProber, ProbeCredentials, ProbeReport};
pub use profile::{ModelRate, Pricing, PricingTable, ProfileSet, ProviderProfile};
pub use registry::{AuthScheme, ProviderSpec, PROVIDERS};
pub use traits::{ProviderAdapter, RawCompletion, RawUsage};
