//! Mutable state shared by the requests of one batch.

use std::collections::BTreeSet;

use crate::batch::BatchContext;
use crate::batch::variables::VariableBindings;
use crate::error::{BatchError, M3Result, StoreError};
use crate::ids::{IndividualId, ModelId};
use crate::model::Change;
use crate::request::{Arguments, ValueArgument};
use crate::response::{HistoryJson, MetaData};

#[derive(Debug, Default)]
pub struct BatchState {
    /// Normalised acting user, `None` for anonymous callers.
    pub actor: Option<String>,
    pub model_id: Option<ModelId>,
    /// Individuals to render for a merge response.
    pub relevant_individuals: BTreeSet<IndividualId>,
    /// Some request asked for a full re-render.
    pub render_bulk: bool,
    pub render_model_annotations: bool,
    /// A non-meta request ran.
    pub non_meta: bool,
    /// Label of the first meta request that ran.
    pub meta_operation: Option<&'static str>,
    pub variables: VariableBindings,
    /// Effective changes of the request being dispatched.
    pub changes: Vec<Change>,
    pub meta: MetaData,
    pub export_model: Option<String>,
    pub undo: Option<Vec<HistoryJson>>,
    pub redo: Option<Vec<HistoryJson>>,
}

impl BatchState {
    pub fn new(actor: Option<String>) -> Self {
        Self {
            actor,
            ..Default::default()
        }
    }

    /// Whether only meta requests ran.
    pub fn is_meta_only(&self) -> bool {
        self.meta_operation.is_some() && !self.non_meta
    }

    /// Record that a model-changing or model-rendering request is running.
    pub fn mark_non_meta(&mut self) -> Result<(), BatchError> {
        if let Some(operation) = self.meta_operation {
            return Err(BatchError::MetaConflict {
                operation: operation.to_string(),
            });
        }
        self.non_meta = true;
        Ok(())
    }

    /// Record that the meta request `label` is running.
    pub fn mark_meta(&mut self, label: &'static str) -> Result<(), BatchError> {
        if self.non_meta {
            return Err(BatchError::MetaConflict {
                operation: label.to_string(),
            });
        }
        self.meta_operation.get_or_insert(label);
        Ok(())
    }

    /// Pin the batch to `model`. Fails if another model is already pinned.
    pub fn pin_model(&mut self, model: ModelId) -> Result<ModelId, BatchError> {
        match &self.model_id {
            Some(current) if current != &model => Err(BatchError::MultipleModelIds {
                first: current.to_string(),
                second: model.to_string(),
            }),
            Some(current) => Ok(current.clone()),
            None => {
                self.model_id = Some(model.clone());
                Ok(model)
            }
        }
    }

    /// The model this request addresses: its `modelId` argument, or the one
    /// an earlier request pinned. The model must exist.
    pub fn model(&mut self, ctx: &BatchContext<'_>, args: &Arguments) -> M3Result<ModelId> {
        let model = match args.model_id.as_deref().filter(|m| !m.is_empty()) {
            Some(requested) => self.pin_model(ModelId::new(requested))?,
            None => self.model_id.clone().ok_or_else(|| BatchError::MissingParameter {
                name: "modelId".into(),
            })?,
        };
        if !ctx.store.contains_model(&model) {
            return Err(StoreError::ModelNotFound {
                model: model.to_string(),
            }
            .into());
        }
        Ok(model)
    }

    pub fn record(&mut self, changes: impl IntoIterator<Item = Change>) {
        self.changes.extend(changes);
    }

    /// Resolve an individual argument through the variable bindings.
    pub fn resolve(
        &self,
        ctx: &BatchContext<'_>,
        model: &ModelId,
        token: Option<&str>,
        name: &str,
    ) -> M3Result<IndividualId> {
        let token = required(token, name)?;
        self.variables.resolve(token, ctx.store, model)
    }
}

/// A required string argument, treating empty strings as absent.
pub fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, BatchError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BatchError::MissingParameter {
            name: name.to_string(),
        })
}

/// `values`, required to be present and non-empty.
pub fn required_values(args: &Arguments) -> Result<&[ValueArgument], BatchError> {
    match args.values.as_deref() {
        Some(values) if !values.is_empty() => Ok(values),
        _ => Err(BatchError::MissingParameter {
            name: "values".into(),
        }),
    }
}
