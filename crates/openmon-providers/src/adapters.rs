//! Adapter lookup by provider kind.

use std::collections::HashMap;
use std::sync::Arc;

use openmon_core::types::ProviderKind;

use crate::chat::ChatCompletionsAdapter;
use crate::error::ErrorClassifier;
use crate::http::HttpTransport;
use crate::ollama::OllamaAdapter;
use crate::traits::ProviderAdapter;

/// One adapter per provider kind, shared across concurrent calls.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&ProviderKind> = self.adapters.keys().collect();
        kinds.sort();
        f.debug_struct("AdapterSet").field("kinds", &kinds).finish()
    }
}

impl AdapterSet {
    /// An empty set; register adapters with [`AdapterSet::register`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in adapters for all four families, using the default
    /// classification table.
    pub fn with_defaults() -> Self {
        Self::with_classifier(ErrorClassifier::default())
    }

    /// Built-in adapters sharing one transport and the given classifier.
    pub fn with_classifier(classifier: ErrorClassifier) -> Self {
        let transport = HttpTransport::new();
        let classifier = Arc::new(classifier);

        let mut set = Self::new();
        for kind in [
            ProviderKind::HostedKey,
            ProviderKind::Aggregator,
            ProviderKind::SecondaryHosted,
        ] {
            set.register(Arc::new(ChatCompletionsAdapter::new(
                kind,
                transport.clone(),
                Arc::clone(&classifier),
            )));
        }
        set.register(Arc::new(OllamaAdapter::new(transport, classifier)));
        set
    }

    /// Register (or replace) the adapter for its kind.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
