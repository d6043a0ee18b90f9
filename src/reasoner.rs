//! Consistency checking and type inference.
//!
//! The engine only needs three things from a reasoner: a flush after a
//! batch has mutated a model, a consistency verdict, and the inferred types
//! of individuals. [`StructuralReasoner`] answers these from the vocabulary
//! alone: inferred types are the superclass closure of the asserted named
//! classes, and an individual is unsatisfiable when two of its classes are
//! declared disjoint.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;

use crate::ids::{IndividualId, ModelId};
use crate::model::Model;
use crate::vocabulary::Vocabulary;

pub trait Reasoner: Send + Sync {
    /// Recompute inferences for the model's current state.
    fn flush(&self, model: &Model);

    /// Whether the model was consistent at the last flush.
    fn is_consistent(&self, model: &ModelId) -> bool;

    /// Inferred named types of an individual at the last flush.
    fn get_types(&self, model: &ModelId, individual: &IndividualId) -> Vec<String>;
}

/// A pair of disjoint classes found on one individual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clash {
    pub individual: IndividualId,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Default)]
struct Inferences {
    types: BTreeMap<IndividualId, BTreeSet<String>>,
    clashes: Vec<Clash>,
}

/// Reasoner over the vocabulary's subclass and disjointness declarations.
pub struct StructuralReasoner {
    vocabulary: Arc<Vocabulary>,
    cache: DashMap<ModelId, Arc<Inferences>>,
}

impl StructuralReasoner {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            vocabulary,
            cache: DashMap::new(),
        }
    }

    /// Disjointness clashes found at the last flush.
    pub fn clashes(&self, model: &ModelId) -> Vec<Clash> {
        self.cache
            .get(model)
            .map(|i| i.clashes.clone())
            .unwrap_or_default()
    }

    fn infer(&self, model: &Model) -> Inferences {
        let mut inferences = Inferences::default();
        for individual in model.individuals() {
            let asserted: BTreeSet<&str> = model
                .types_of(individual)
                .flat_map(|t| t.asserted_classes())
                .collect();

            let mut entailed = BTreeSet::new();
            for class in &asserted {
                entailed.extend(self.vocabulary.ancestors(class));
            }

            let asserted: Vec<&str> = asserted.into_iter().collect();
            for (i, left) in asserted.iter().enumerate() {
                for right in &asserted[i + 1..] {
                    if self.vocabulary.are_disjoint(left, right) {
                        inferences.clashes.push(Clash {
                            individual: individual.clone(),
                            left: left.to_string(),
                            right: right.to_string(),
                        });
                    }
                }
            }
            inferences.types.insert(individual.clone(), entailed);
        }
        inferences
    }
}

impl Reasoner for StructuralReasoner {
    fn flush(&self, model: &Model) {
        let inferences = self.infer(model);
        tracing::debug!(
            model = %model.id(),
            individuals = inferences.types.len(),
            clashes = inferences.clashes.len(),
            "reasoner flushed"
        );
        self.cache.insert(model.id().clone(), Arc::new(inferences));
    }

    fn is_consistent(&self, model: &ModelId) -> bool {
        self.cache
            .get(model)
            .is_none_or(|i| i.clashes.is_empty())
    }

    fn get_types(&self, model: &ModelId, individual: &IndividualId) -> Vec<String> {
        self.cache
            .get(model)
            .and_then(|i| i.types.get(individual).map(|t| t.iter().cloned().collect()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Axiom, Change, ClassExpression};

    fn model_with(types: &[(&str, &[&str])]) -> Model {
        let mut model = Model::new(ModelId::from("gomodel:r"));
        for (id, classes) in types {
            let individual = IndividualId::from(*id);
            model.apply(&Change::Add(Axiom::Declaration {
                individual: individual.clone(),
            }));
            for class in *classes {
                model.apply(&Change::Add(Axiom::ClassAssertion {
                    individual: individual.clone(),
                    expression: ClassExpression::class(*class),
                }));
            }
        }
        model
    }

    #[test]
    fn infers_superclasses() {
        let reasoner = StructuralReasoner::new(Arc::new(Vocabulary::builtin()));
        let model = model_with(&[("a", &["GO:0009653"])]);
        reasoner.flush(&model);
        let types = reasoner.get_types(model.id(), &IndividualId::from("a"));
        assert!(types.contains(&"GO:0048856".to_string()));
        assert!(types.contains(&"GO:0008150".to_string()));
        assert!(reasoner.is_consistent(model.id()));
    }

    #[test]
    fn disjoint_types_make_model_inconsistent() {
        let reasoner = StructuralReasoner::new(Arc::new(Vocabulary::builtin()));
        let model = model_with(&[("a", &["GO:0003674", "GO:0006915"]), ("b", &["GO:0008150"])]);
        reasoner.flush(&model);
        assert!(!reasoner.is_consistent(model.id()));
        let clashes = reasoner.clashes(model.id());
        assert_eq!(clashes.len(), 1);
        assert_eq!(clashes[0].individual, IndividualId::from("a"));
    }

    #[test]
    fn flush_replaces_previous_verdict() {
        let reasoner = StructuralReasoner::new(Arc::new(Vocabulary::builtin()));
        let bad = model_with(&[("a", &["GO:0003674", "GO:0008150"])]);
        reasoner.flush(&bad);
        assert!(!reasoner.is_consistent(bad.id()));
        let good = model_with(&[("a", &["GO:0003674"])]);
        reasoner.flush(&good);
        assert!(reasoner.is_consistent(good.id()));
    }
}
