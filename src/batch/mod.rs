//! Batch dispatch: runs an ordered list of requests against one model.
//!
//! # Architecture
//!
//! - [`BatchContext`]: the collaborators a handler may use (store, ledger,
//!   reasoner, renderer, validator, configuration)
//! - [`BatchState`]: what the requests of one batch share (pinned model,
//!   variables, render flags, meta payload)
//! - [`handler_for`]: the dispatch table from `(EntityKind, Operation)` to a
//!   [`Handler`]
//! - [`process_batch`]: permission gate, dispatch and ledger bookkeeping
//!   for each request, then the consistency check of the touched model
//!
//! Requests run strictly in order. The first failing request ends the
//! batch; edits made by earlier requests stay applied.

pub mod edge;
pub mod individual;
pub mod meta;
pub mod model;
pub mod state;
pub mod variables;

use chrono::Utc;

use crate::config::EngineConfig;
use crate::error::{BatchError, M3Result};
use crate::ids::ModelId;
use crate::ledger::{ChangeRecord, UndoRedoLedger};
use crate::lookup::LabelResolver;
use crate::model::{Annotation, AnnotationShorthand, AnnotationTarget, ExpressionParser, Model};
use crate::permission;
use crate::reasoner::Reasoner;
use crate::render::Renderer;
use crate::request::{Arguments, EntityKind, Operation, Request};
use crate::store::ModelStore;
use crate::validate::Validator;

pub use state::BatchState;
pub use variables::VariableBindings;

/// Everything a handler may call out to.
pub struct BatchContext<'a> {
    pub config: &'a EngineConfig,
    pub store: &'a dyn ModelStore,
    pub ledger: &'a UndoRedoLedger,
    pub reasoner: &'a dyn Reasoner,
    pub renderer: &'a dyn Renderer,
    pub validator: &'a dyn Validator,
    pub labels: &'a dyn LabelResolver,
}

impl BatchContext<'_> {
    pub fn parser(&self) -> ExpressionParser<'_> {
        if self.config.check_literal_identifiers {
            ExpressionParser::checked(&self.config.vocabulary)
        } else {
            ExpressionParser::lenient()
        }
    }

    /// Contributor and, if `with_date`, creation date annotations for
    /// content created by `actor`.
    pub fn generated_annotations(&self, actor: Option<&str>, with_date: bool) -> Vec<Annotation> {
        let mut out = Vec::new();
        if let Some(actor) = actor.filter(|_| self.config.use_user_id) {
            out.push(Annotation::shorthand(AnnotationShorthand::Contributor, actor));
        }
        if with_date && self.config.use_creation_date {
            out.push(Annotation::shorthand(
                AnnotationShorthand::Date,
                Utc::now().format("%Y-%m-%d").to_string(),
            ));
        }
        out
    }

    /// Record the acting user as a contributor of the model itself.
    pub fn stamp_model_contributor(&self, state: &mut BatchState, model: &ModelId) -> M3Result<()> {
        let contributor = self.generated_annotations(state.actor.as_deref(), false);
        if contributor.is_empty() {
            return Ok(());
        }
        let changes = self
            .store
            .add_annotations(model, &AnnotationTarget::Model, &contributor)?;
        state.record(changes);
        Ok(())
    }
}

/// An operation handler.
pub type Handler = fn(&BatchContext<'_>, &mut BatchState, &Arguments) -> M3Result<()>;

/// The dispatch table.
pub fn handler_for(entity: EntityKind, operation: Operation) -> Option<Handler> {
    use EntityKind as E;
    use Operation as O;

    let handler: Handler = match (entity, operation) {
        (E::Individual, O::Get) => individual::get,
        (E::Individual, O::Add) => individual::add,
        (E::Individual, O::Remove) => individual::remove,
        (E::Individual, O::AddType) => individual::add_type,
        (E::Individual, O::RemoveType) => individual::remove_type,
        (E::Individual, O::AddAnnotation) => individual::add_annotation,
        (E::Individual, O::RemoveAnnotation) => individual::remove_annotation,

        (E::Edge, O::Add) => edge::add,
        (E::Edge, O::Remove) => edge::remove,
        (E::Edge, O::AddAnnotation) => edge::add_annotation,
        (E::Edge, O::RemoveAnnotation) => edge::remove_annotation,

        (E::Model, O::Get) => model::get,
        (E::Model, O::Add) => model::add,
        (E::Model, O::AddAnnotation) => model::add_annotation,
        (E::Model, O::RemoveAnnotation) => model::remove_annotation,
        (E::Model, O::Export) => model::export,
        (E::Model, O::ExportLegacy) => model::export_legacy,
        (E::Model, O::Import) => model::import,
        (E::Model, O::Store) => model::store,
        (E::Model, O::Undo) => model::undo,
        (E::Model, O::Redo) => model::redo,
        (E::Model, O::GetUndoRedo) => model::get_undo_redo,
        (E::Model, O::AllModelIds) => model::all_model_ids,
        (E::Model, O::AllModelMeta) => model::all_model_meta,
        (E::Model, O::UpdateImports) => model::update_imports,

        (E::Relations, O::Get) => meta::relations,
        (E::Evidence, O::Get) => meta::evidence,

        _ => return None,
    };
    Some(handler)
}

/// Result of a batch that ran to completion.
#[derive(Debug)]
pub enum BatchOutcome {
    /// Only meta requests ran; nothing is rendered from a model.
    Meta(BatchState),
    /// The touched model after the batch, with the reasoner's verdict.
    Model {
        state: BatchState,
        model: Model,
        consistent: bool,
    },
}

/// Run `requests` in order on behalf of `actor`.
pub fn process_batch(
    ctx: &BatchContext<'_>,
    actor: Option<String>,
    requests: &[Request],
    privileged: bool,
) -> M3Result<BatchOutcome> {
    if requests.is_empty() {
        return Err(BatchError::EmptyBatch.into());
    }
    let mut state = BatchState::new(actor);

    for (index, request) in requests.iter().enumerate() {
        let entity: EntityKind = request.entity.parse()?;
        let operation: Operation = request.operation.parse()?;
        tracing::debug!(index, %entity, %operation, "dispatching request");

        permission::check(entity, operation, privileged)?;
        let handler =
            handler_for(entity, operation).ok_or_else(|| BatchError::UnsupportedOperation {
                entity: entity.to_string(),
                operation: operation.to_string(),
            })?;

        let result = handler(ctx, &mut state, &request.arguments);

        // Edits that took effect are recorded even when the request failed
        // halfway, so undo can still revert them.
        let changes = std::mem::take(&mut state.changes);
        if let Some(model) = &state.model_id {
            ctx.ledger
                .push(model, ChangeRecord::new(state.actor.clone(), changes));
        }
        result?;
    }

    if state.is_meta_only() {
        return Ok(BatchOutcome::Meta(state));
    }
    let model_id = state.model_id.clone().ok_or_else(|| BatchError::MissingParameter {
        name: "modelId".into(),
    })?;
    let model = ctx.store.snapshot(&model_id)?;
    ctx.reasoner.flush(&model);
    let consistent = ctx.reasoner.is_consistent(&model_id);
    if !consistent {
        tracing::info!(model = %model_id, "model is inconsistent after batch");
    }
    Ok(BatchOutcome::Model {
        state,
        model,
        consistent,
    })
}
