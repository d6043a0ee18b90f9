//! Engine facade: top-level API for the m3 batch engine.
//!
//! The `BatchEngine` owns the collaborators (model store, undo/redo ledger,
//! reasoner, renderer, validator, label resolution) and turns one batch
//! call into one [`BatchResponse`]. It never fails at the call level: every
//! error, including a panic inside a handler, becomes an error response.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use crate::batch::{self, BatchContext};
use crate::config::EngineConfig;
use crate::error::M3Result;
use crate::ids::{ModelId, new_packet_id};
use crate::ledger::UndoRedoLedger;
use crate::lookup::{ChainedLabels, ExternalLookup, HttpLabelLookup, LabelResolver};
use crate::reasoner::{Reasoner, StructuralReasoner};
use crate::render::{JsonRenderer, Renderer};
use crate::request::{BatchRequest, Request};
use crate::response::{self, BatchResponse, ResponseHeader};
use crate::store::{MemModelStore, ModelStore};
use crate::validate::{BeforeSaveValidator, Validator};

/// Trim the caller id; empty and `anonymous` mean no actor.
pub fn normalize_actor(uid: Option<&str>) -> Option<String> {
    uid.map(str::trim)
        .filter(|u| !u.is_empty() && !u.eq_ignore_ascii_case("anonymous"))
        .map(str::to_string)
}

/// The m3 batch engine.
pub struct BatchEngine {
    config: EngineConfig,
    store: Arc<dyn ModelStore>,
    ledger: UndoRedoLedger,
    reasoner: Arc<dyn Reasoner>,
    renderer: Arc<dyn Renderer>,
    validator: Arc<dyn Validator>,
    labels: Arc<dyn LabelResolver>,
}

impl BatchEngine {
    /// Create an engine with the reference collaborators.
    pub fn new(config: EngineConfig) -> M3Result<Self> {
        let vocabulary = Arc::new(config.vocabulary.clone());

        let store: Arc<dyn ModelStore> = match &config.data_dir {
            Some(dir) => Arc::new(MemModelStore::with_persistence(dir)?),
            None => Arc::new(MemModelStore::new()),
        };
        let external = config
            .label_service
            .as_deref()
            .map(|url| Arc::new(HttpLabelLookup::new(url)) as Arc<dyn ExternalLookup>);
        let labels: Arc<dyn LabelResolver> =
            Arc::new(ChainedLabels::new(Arc::clone(&vocabulary), external));

        tracing::info!(
            data_dir = ?config.data_dir,
            classes = vocabulary.classes.len(),
            relations = vocabulary.relations.len(),
            label_service = config.label_service.as_deref().unwrap_or("none"),
            "initializing m3 batch engine"
        );

        Ok(Self {
            store,
            ledger: UndoRedoLedger::new(),
            reasoner: Arc::new(StructuralReasoner::new(vocabulary)),
            renderer: Arc::new(JsonRenderer::new(Arc::clone(&labels))),
            validator: Arc::new(BeforeSaveValidator),
            labels,
            config,
        })
    }

    /// Replace the model store.
    pub fn with_store(mut self, store: Arc<dyn ModelStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the reasoner.
    pub fn with_reasoner(mut self, reasoner: Arc<dyn Reasoner>) -> Self {
        self.reasoner = reasoner;
        self
    }

    /// Replace the pre-save validator.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ModelStore {
        self.store.as_ref()
    }

    pub fn ledger(&self) -> &UndoRedoLedger {
        &self.ledger
    }

    pub fn model_ids(&self) -> M3Result<Vec<ModelId>> {
        Ok(self.store.model_ids()?)
    }

    fn context(&self) -> BatchContext<'_> {
        BatchContext {
            config: &self.config,
            store: self.store.as_ref(),
            ledger: &self.ledger,
            reasoner: self.reasoner.as_ref(),
            renderer: self.renderer.as_ref(),
            validator: self.validator.as_ref(),
            labels: self.labels.as_ref(),
        }
    }

    /// Run one batch and describe the outcome.
    ///
    /// `packet_id` is generated when absent. Only `privileged` callers may
    /// edit models.
    pub fn m3_batch(
        &self,
        uid: Option<&str>,
        intention: Option<&str>,
        packet_id: Option<&str>,
        requests: &[Request],
        privileged: bool,
    ) -> BatchResponse {
        let header = ResponseHeader {
            packet_id: packet_id
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .unwrap_or_else(new_packet_id),
            uid: uid.map(str::to_string),
            intention: intention.map(str::to_string),
        };
        let actor = normalize_actor(uid);

        let span = tracing::info_span!(
            "batch",
            packet_id = %header.packet_id,
            actor = actor.as_deref().unwrap_or("anonymous"),
            privileged,
        );
        let _guard = span.enter();

        let ctx = self.context();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            batch::process_batch(&ctx, actor, requests, privileged)
                .map(|outcome| response::assemble(&ctx, outcome))
        }));

        match result {
            Ok(Ok((signal, data))) => {
                tracing::info!(requests = requests.len(), ?signal, "batch completed");
                BatchResponse::success(header, signal, data)
            }
            Ok(Err(err)) => {
                tracing::warn!(class = %err.class(), error = %err, "batch failed");
                BatchResponse::failure(header, &err)
            }
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                tracing::error!(detail = %detail, "critical failure while processing batch");
                BatchResponse::internal_error(header)
            }
        }
    }

    /// [`BatchEngine::m3_batch`] for a deserialised request body.
    pub fn handle(&self, request: &BatchRequest, privileged: bool) -> BatchResponse {
        self.m3_batch(
            request.uid.as_deref(),
            request.intention.as_deref(),
            request.packet_id.as_deref(),
            &request.requests,
            privileged,
        )
    }

    /// Summary information about the engine state.
    pub fn info(&self) -> M3Result<EngineInfo> {
        Ok(EngineInfo {
            models: self.store.model_ids()?.len(),
            data_dir: self.config.data_dir.clone(),
            classes: self.config.vocabulary.classes.len(),
            relations: self.config.vocabulary.relations.len(),
            evidence: self.config.vocabulary.evidence.len(),
        })
    }
}

/// Summary information about the engine.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub models: usize,
    pub data_dir: Option<PathBuf>,
    pub classes: usize,
    pub relations: usize,
    pub evidence: usize,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "m3 batch engine")?;
        writeln!(f, "  models:    {}", self.models)?;
        writeln!(f, "  classes:   {}", self.classes)?;
        writeln!(f, "  relations: {}", self.relations)?;
        writeln!(f, "  evidence:  {}", self.evidence)?;
        match &self.data_dir {
            Some(dir) => write!(f, "  data dir:  {}", dir.display()),
            None => write!(f, "  data dir:  (memory only)"),
        }
    }
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine")
            .field("data_dir", &self.config.data_dir)
            .field("add_inferences", &self.config.add_inferences)
            .field("validate_before_save", &self.config.validate_before_save)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Arguments;
    use crate::response::{MessageType, Signal};

    #[test]
    fn actor_normalisation() {
        assert_eq!(normalize_actor(Some("  orcid:1 ")).as_deref(), Some("orcid:1"));
        assert_eq!(normalize_actor(Some("anonymous")), None);
        assert_eq!(normalize_actor(Some("   ")), None);
        assert_eq!(normalize_actor(None), None);
    }

    #[test]
    fn packet_id_is_echoed_or_generated() {
        let engine = BatchEngine::new(EngineConfig::default()).unwrap();
        let requests = [Request::new("relations", "get", Arguments::default())];
        let echoed = engine.m3_batch(None, Some("query"), Some("abc"), &requests, false);
        assert_eq!(echoed.packet_id, "abc");
        assert_eq!(echoed.intention.as_deref(), Some("query"));
        let generated = engine.m3_batch(None, None, None, &requests, false);
        assert!(!generated.packet_id.is_empty());
        assert_eq!(generated.signal, Some(Signal::Meta));
    }

    #[test]
    fn empty_batch_is_an_error_response() {
        let engine = BatchEngine::new(EngineConfig::default()).unwrap();
        let response = engine.m3_batch(Some("orcid:1"), None, None, &[], true);
        assert_eq!(response.message_type, MessageType::Error);
        assert_eq!(
            response.message,
            "Empty batch calls are not supported, at least one request is required."
        );
    }

    struct Exploding;

    impl Validator for Exploding {
        fn validate(&self, _model: &crate::model::Model) -> Vec<String> {
            panic!("validator blew up")
        }
    }

    #[test]
    fn panics_become_internal_errors() {
        let engine = BatchEngine::new(EngineConfig::default())
            .unwrap()
            .with_validator(Arc::new(Exploding));
        let model = engine.store().generate_blank_model().unwrap();
        let requests = [Request::new(
            "model",
            "store",
            Arguments {
                model_id: Some(model.to_string()),
                ..Default::default()
            },
        )];
        let response = engine.m3_batch(Some("orcid:1"), None, None, &requests, true);
        assert_eq!(response.message, response::INTERNAL_ERROR_MESSAGE);
        assert!(response.commentary.is_none());
    }
}
