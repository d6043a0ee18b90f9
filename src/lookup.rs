//! Label resolution for rendered ids.
//!
//! The renderer asks a [`LabelResolver`] for human-readable labels. The
//! usual resolver is [`ChainedLabels`]: the local vocabulary first, then an
//! optional [`ExternalLookup`] such as [`HttpLabelLookup`].

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::vocabulary::Vocabulary;

pub trait LabelResolver: Send + Sync {
    fn label(&self, id: &str) -> Option<String>;
}

/// A remote source of labels for ids the vocabulary does not know.
pub trait ExternalLookup: Send + Sync {
    fn lookup_label(&self, id: &str) -> Option<String>;
}

impl LabelResolver for Vocabulary {
    fn label(&self, id: &str) -> Option<String> {
        Vocabulary::label(self, id).map(str::to_string)
    }
}

/// `local label orElse external label`.
pub struct ChainedLabels {
    local: Arc<Vocabulary>,
    external: Option<Arc<dyn ExternalLookup>>,
}

impl ChainedLabels {
    pub fn new(local: Arc<Vocabulary>, external: Option<Arc<dyn ExternalLookup>>) -> Self {
        Self { local, external }
    }

    pub fn local_only(local: Arc<Vocabulary>) -> Self {
        Self::new(local, None)
    }
}

impl LabelResolver for ChainedLabels {
    fn label(&self, id: &str) -> Option<String> {
        self.local
            .label(id)
            .map(str::to_string)
            .or_else(|| self.external.as_ref().and_then(|e| e.lookup_label(id)))
    }
}

/// Looks labels up at `GET {base_url}/{id}`, expecting `{"label": "..."}`.
///
/// Results, including misses, are cached for the lifetime of the lookup.
/// Network failures are logged and treated as misses.
pub struct HttpLabelLookup {
    base_url: String,
    agent: ureq::Agent,
    cache: DashMap<String, Option<String>>,
}

impl HttpLabelLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(5))
                .build(),
            cache: DashMap::new(),
        }
    }

    fn fetch(&self, id: &str) -> Option<String> {
        let url = format!("{}/{}", self.base_url, id);
        match self.agent.get(&url).call() {
            Ok(resp) => {
                let json: serde_json::Value = resp.into_json().ok()?;
                json["label"].as_str().map(str::to_string)
            }
            Err(ureq::Error::Status(404, _)) => None,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "label lookup failed");
                None
            }
        }
    }
}

impl ExternalLookup for HttpLabelLookup {
    fn lookup_label(&self, id: &str) -> Option<String> {
        if let Some(hit) = self.cache.get(id) {
            return hit.value().clone();
        }
        let label = self.fetch(id);
        self.cache.insert(id.to_string(), label.clone());
        label
    }
}
