//! Model storage.
//!
//! [`ModelStore`] is the seam between the batch engine and wherever models
//! live. Implementations provide a handful of primitives (snapshot, atomic
//! update, creation, persistence); the domain edits used by the operation
//! handlers are provided methods built on [`ModelStore::update`], so every
//! edit is planned and applied under the store's per-model lock.
//!
//! [`MemModelStore`] keeps models in memory and optionally persists them as
//! JSON documents.

pub mod mem;

use crate::error::StoreError;
use crate::ids::{IndividualId, ModelId};
use crate::model::{
    Annotation, AnnotationTarget, Axiom, Change, ClassExpression, FactKey, Model, ModelDocument,
    Removal,
};

pub use mem::MemModelStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Callback planning an edit against the current state of a model.
pub type EditPlan<'a> = dyn FnMut(&Model) -> StoreResult<Vec<Change>> + 'a;

pub trait ModelStore: Send + Sync {
    /// Create a new, empty model and return its id.
    fn generate_blank_model(&self) -> StoreResult<ModelId>;

    /// Materialise a model from a document. Fails if the id is taken.
    fn import_model(&self, document: ModelDocument) -> StoreResult<ModelId>;

    fn contains_model(&self, model: &ModelId) -> bool;

    /// Ids of all loaded and stored models, sorted.
    fn model_ids(&self) -> StoreResult<Vec<ModelId>>;

    /// A copy of the model's current state.
    fn snapshot(&self, model: &ModelId) -> StoreResult<Model>;

    fn contains_individual(&self, model: &ModelId, individual: &IndividualId) -> StoreResult<bool>;

    /// Allocate an unused individual id inside `model`.
    fn fresh_individual_id(&self, model: &ModelId) -> IndividualId;

    /// Plan an edit against the current state and apply it atomically.
    /// Returns the changes that took effect.
    fn update(&self, model: &ModelId, plan: &mut EditPlan<'_>) -> StoreResult<Vec<Change>>;

    /// Persist the model's current state.
    fn save_model(&self, model: &ModelId) -> StoreResult<()>;

    // -----------------------------------------------------------------------
    // Provided edits
    // -----------------------------------------------------------------------

    fn apply_changes(&self, model: &ModelId, changes: &[Change]) -> StoreResult<Vec<Change>> {
        self.update(model, &mut |_| Ok(changes.to_vec()))
    }

    /// Revert a recorded edit.
    fn undo(&self, model: &ModelId, changes: &[Change]) -> StoreResult<Vec<Change>> {
        let inverse: Vec<Change> = changes.iter().rev().map(Change::inverse).collect();
        self.apply_changes(model, &inverse)
    }

    /// Re-apply a reverted edit.
    fn redo(&self, model: &ModelId, changes: &[Change]) -> StoreResult<Vec<Change>> {
        self.apply_changes(model, changes)
    }

    /// Create an individual typed by the first expression, with the rest
    /// asserted as additional types.
    fn create_individual(
        &self,
        model: &ModelId,
        expressions: &[ClassExpression],
        annotations: &[Annotation],
    ) -> StoreResult<(IndividualId, Vec<Change>)> {
        let individual = self.fresh_individual_id(model);
        let changes = self.update(model, &mut |_| {
            let mut changes = vec![Change::Add(Axiom::Declaration {
                individual: individual.clone(),
            })];
            changes.extend(expressions.iter().map(|e| {
                Change::Add(Axiom::ClassAssertion {
                    individual: individual.clone(),
                    expression: e.clone(),
                })
            }));
            changes.extend(annotations.iter().map(|a| {
                Change::Add(Axiom::IndividualAnnotation {
                    individual: individual.clone(),
                    annotation: a.clone(),
                })
            }));
            Ok(changes)
        })?;
        Ok((individual, changes))
    }

    fn add_type(
        &self,
        model: &ModelId,
        individual: &IndividualId,
        expression: &ClassExpression,
    ) -> StoreResult<Vec<Change>> {
        self.update(model, &mut |m| {
            require_individual(m, individual)?;
            Ok(vec![Change::Add(Axiom::ClassAssertion {
                individual: individual.clone(),
                expression: expression.clone(),
            })])
        })
    }

    fn remove_type(
        &self,
        model: &ModelId,
        individual: &IndividualId,
        expression: &ClassExpression,
    ) -> StoreResult<Vec<Change>> {
        self.update(model, &mut |m| {
            require_individual(m, individual)?;
            Ok(vec![Change::Remove(Axiom::ClassAssertion {
                individual: individual.clone(),
                expression: expression.clone(),
            })])
        })
    }

    /// Add a fact between two existing individuals. Annotations merge into
    /// an existing fact with the same key.
    fn add_fact(
        &self,
        model: &ModelId,
        fact: &FactKey,
        annotations: &[Annotation],
    ) -> StoreResult<Vec<Change>> {
        self.update(model, &mut |m| {
            require_individual(m, &fact.subject)?;
            require_individual(m, &fact.object)?;
            Ok(m.plan_add_fact(fact, annotations))
        })
    }

    /// Remove a fact. The returned candidates should be passed to
    /// [`ModelStore::sweep_orphans`].
    fn remove_fact(&self, model: &ModelId, fact: &FactKey) -> StoreResult<Removal> {
        let mut candidates = Vec::new();
        let changes = self.update(model, &mut |m| {
            let removal = m.plan_remove_fact(fact).ok_or_else(|| StoreError::FactNotFound {
                model: m.id().to_string(),
                subject: fact.subject.to_string(),
                predicate: fact.predicate.clone(),
                object: fact.object.to_string(),
            })?;
            candidates = removal.orphan_candidates;
            Ok(removal.changes)
        })?;
        Ok(Removal {
            changes,
            orphan_candidates: candidates,
        })
    }

    fn add_annotations(
        &self,
        model: &ModelId,
        target: &AnnotationTarget,
        annotations: &[Annotation],
    ) -> StoreResult<Vec<Change>> {
        self.update(model, &mut |m| {
            require_target(m, target)?;
            Ok(m.plan_add_annotations(target, annotations))
        })
    }

    /// Remove annotations. Removed reference values are returned as orphan
    /// candidates.
    fn remove_annotations(
        &self,
        model: &ModelId,
        target: &AnnotationTarget,
        annotations: &[Annotation],
    ) -> StoreResult<Removal> {
        let mut candidates = Vec::new();
        let changes = self.update(model, &mut |m| {
            require_target(m, target)?;
            let removal = m.plan_remove_annotations(target, annotations);
            candidates = removal.orphan_candidates;
            Ok(removal.changes)
        })?;
        Ok(Removal {
            changes,
            orphan_candidates: candidates,
        })
    }

    /// Delete an individual with everything mentioning it.
    fn delete_individual(&self, model: &ModelId, individual: &IndividualId) -> StoreResult<Removal> {
        let mut candidates = Vec::new();
        let changes = self.update(model, &mut |m| {
            require_individual(m, individual)?;
            let removal = m.plan_delete_individual(individual);
            candidates = removal.orphan_candidates;
            Ok(removal.changes)
        })?;
        Ok(Removal {
            changes,
            orphan_candidates: candidates,
        })
    }

    /// Delete candidates that are no longer the value of any annotation,
    /// transitively. See [`Model::plan_sweep`] for the traversal order.
    fn sweep_orphans(
        &self,
        model: &ModelId,
        candidates: &[IndividualId],
    ) -> StoreResult<Vec<Change>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        self.update(model, &mut |m| Ok(m.plan_sweep(candidates)))
    }

    /// Serialise the model as a pretty-printed JSON document.
    fn export_model(&self, model: &ModelId) -> StoreResult<String> {
        let snapshot = self.snapshot(model)?;
        serde_json::to_string_pretty(&snapshot.document()).map_err(|e| {
            StoreError::Serialization {
                message: e.to_string(),
            }
        })
    }
}

fn require_individual(model: &Model, individual: &IndividualId) -> StoreResult<()> {
    if model.contains_individual(individual) {
        Ok(())
    } else {
        Err(StoreError::IndividualNotFound {
            model: model.id().to_string(),
            individual: individual.to_string(),
        })
    }
}

fn require_target(model: &Model, target: &AnnotationTarget) -> StoreResult<()> {
    match target {
        AnnotationTarget::Model => Ok(()),
        AnnotationTarget::Individual(individual) => require_individual(model, individual),
        AnnotationTarget::Fact(fact) => {
            if model.fact_annotations(fact).is_some() {
                Ok(())
            } else {
                Err(StoreError::FactNotFound {
                    model: model.id().to_string(),
                    subject: fact.subject.to_string(),
                    predicate: fact.predicate.clone(),
                    object: fact.object.to_string(),
                })
            }
        }
    }
}
