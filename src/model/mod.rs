//! In-memory representation of a molecular model.
//!
//! A [`Model`] is a set of [`Axiom`]s: individual declarations, class
//! assertions, individual annotations, facts (with their own annotation
//! sets), model annotations and imports. All mutation goes through
//! [`Change`]s, which are exactly invertible; this is what makes undo/redo
//! a matter of replaying inverses.
//!
//! The `plan_*` methods compute the changes for an edit without applying
//! them, so a store can run them under its own lock.

pub mod annotation;
pub mod expression;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ids::{IndividualId, ModelId};

pub use annotation::{Annotation, AnnotationShorthand, AnnotationValue};
pub use expression::{ClassExpression, ExpressionArgument, ExpressionParser};

/// Identity of a fact: `subject --predicate--> object`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactKey {
    pub subject: IndividualId,
    pub predicate: String,
    pub object: IndividualId,
}

impl FactKey {
    pub fn new(subject: IndividualId, predicate: impl Into<String>, object: IndividualId) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }

    pub fn touches(&self, individual: &IndividualId) -> bool {
        &self.subject == individual || &self.object == individual
    }
}

/// Atomic unit of model content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "axiom", rename_all = "kebab-case")]
pub enum Axiom {
    Declaration {
        individual: IndividualId,
    },
    ClassAssertion {
        individual: IndividualId,
        expression: ClassExpression,
    },
    IndividualAnnotation {
        individual: IndividualId,
        annotation: Annotation,
    },
    Fact {
        fact: FactKey,
        annotations: BTreeSet<Annotation>,
    },
    ModelAnnotation {
        annotation: Annotation,
    },
    Import {
        iri: String,
    },
}

/// A reversible edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Change {
    Add(Axiom),
    Remove(Axiom),
}

impl Change {
    pub fn inverse(&self) -> Change {
        match self {
            Change::Add(a) => Change::Remove(a.clone()),
            Change::Remove(a) => Change::Add(a.clone()),
        }
    }

    pub fn axiom(&self) -> &Axiom {
        match self {
            Change::Add(a) | Change::Remove(a) => a,
        }
    }
}

/// What an annotation edit applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationTarget {
    Model,
    Individual(IndividualId),
    Fact(FactKey),
}

/// Changes produced by a removal, plus the individuals that were referenced
/// from removed annotation values and may now be orphaned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    pub changes: Vec<Change>,
    pub orphan_candidates: Vec<IndividualId>,
}

/// Serialized form of a model, used for export, import and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    pub id: ModelId,
    pub axioms: Vec<Axiom>,
}

/// A molecular model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    id: ModelId,
    individuals: BTreeSet<IndividualId>,
    types: BTreeMap<IndividualId, BTreeSet<ClassExpression>>,
    individual_annotations: BTreeMap<IndividualId, BTreeSet<Annotation>>,
    facts: BTreeMap<FactKey, BTreeSet<Annotation>>,
    annotations: BTreeSet<Annotation>,
    imports: BTreeSet<String>,
}

impl Model {
    /// Create an empty model.
    pub fn new(id: ModelId) -> Self {
        Self {
            id,
            individuals: BTreeSet::new(),
            types: BTreeMap::new(),
            individual_annotations: BTreeMap::new(),
            facts: BTreeMap::new(),
            annotations: BTreeSet::new(),
            imports: BTreeSet::new(),
        }
    }

    pub fn from_document(doc: ModelDocument) -> Self {
        let mut model = Model::new(doc.id);
        for axiom in doc.axioms {
            model.apply(&Change::Add(axiom));
        }
        model
    }

    pub fn document(&self) -> ModelDocument {
        ModelDocument {
            id: self.id.clone(),
            axioms: self.axioms(),
        }
    }

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    /// Apply a change. Returns `false` if it had no effect.
    pub fn apply(&mut self, change: &Change) -> bool {
        match change {
            Change::Add(axiom) => self.add(axiom),
            Change::Remove(axiom) => self.remove(axiom),
        }
    }

    fn add(&mut self, axiom: &Axiom) -> bool {
        match axiom {
            Axiom::Declaration { individual } => self.individuals.insert(individual.clone()),
            Axiom::ClassAssertion {
                individual,
                expression,
            } => self
                .types
                .entry(individual.clone())
                .or_default()
                .insert(expression.clone()),
            Axiom::IndividualAnnotation {
                individual,
                annotation,
            } => self
                .individual_annotations
                .entry(individual.clone())
                .or_default()
                .insert(annotation.clone()),
            Axiom::Fact { fact, annotations } => {
                if self.facts.contains_key(fact) {
                    false
                } else {
                    self.facts.insert(fact.clone(), annotations.clone());
                    true
                }
            }
            Axiom::ModelAnnotation { annotation } => self.annotations.insert(annotation.clone()),
            Axiom::Import { iri } => self.imports.insert(iri.clone()),
        }
    }

    fn remove(&mut self, axiom: &Axiom) -> bool {
        match axiom {
            Axiom::Declaration { individual } => self.individuals.remove(individual),
            Axiom::ClassAssertion {
                individual,
                expression,
            } => remove_from(&mut self.types, individual, expression),
            Axiom::IndividualAnnotation {
                individual,
                annotation,
            } => remove_from(&mut self.individual_annotations, individual, annotation),
            Axiom::Fact { fact, annotations } => {
                if self.facts.get(fact) == Some(annotations) {
                    self.facts.remove(fact);
                    true
                } else {
                    false
                }
            }
            Axiom::ModelAnnotation { annotation } => self.annotations.remove(annotation),
            Axiom::Import { iri } => self.imports.remove(iri),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn contains_individual(&self, individual: &IndividualId) -> bool {
        self.individuals.contains(individual)
    }

    pub fn individuals(&self) -> impl Iterator<Item = &IndividualId> {
        self.individuals.iter()
    }

    pub fn individual_count(&self) -> usize {
        self.individuals.len()
    }

    pub fn types_of(&self, individual: &IndividualId) -> impl Iterator<Item = &ClassExpression> {
        self.types.get(individual).into_iter().flatten()
    }

    pub fn annotations_of(&self, individual: &IndividualId) -> impl Iterator<Item = &Annotation> {
        self.individual_annotations.get(individual).into_iter().flatten()
    }

    pub fn facts(&self) -> impl Iterator<Item = (&FactKey, &BTreeSet<Annotation>)> {
        self.facts.iter()
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn fact_annotations(&self, fact: &FactKey) -> Option<&BTreeSet<Annotation>> {
        self.facts.get(fact)
    }

    /// Model-level annotations.
    pub fn annotations(&self) -> &BTreeSet<Annotation> {
        &self.annotations
    }

    pub fn imports(&self) -> &BTreeSet<String> {
        &self.imports
    }

    /// Whether any annotation in the model has `individual` as its value.
    pub fn is_annotation_value(&self, individual: &IndividualId) -> bool {
        self.annotations.iter().any(|a| a.value.references(individual))
            || self
                .individual_annotations
                .values()
                .flatten()
                .any(|a| a.value.references(individual))
            || self
                .facts
                .values()
                .flatten()
                .any(|a| a.value.references(individual))
    }

    /// Whether `individual` is an annotation value or an endpoint of a fact.
    pub fn is_referenced(&self, individual: &IndividualId) -> bool {
        self.is_annotation_value(individual) || self.facts.keys().any(|k| k.touches(individual))
    }

    /// Every axiom in the model, in a stable order.
    pub fn axioms(&self) -> Vec<Axiom> {
        let mut out = Vec::new();
        for iri in &self.imports {
            out.push(Axiom::Import { iri: iri.clone() });
        }
        for annotation in &self.annotations {
            out.push(Axiom::ModelAnnotation {
                annotation: annotation.clone(),
            });
        }
        for individual in &self.individuals {
            out.push(Axiom::Declaration {
                individual: individual.clone(),
            });
        }
        for (individual, types) in &self.types {
            for expression in types {
                out.push(Axiom::ClassAssertion {
                    individual: individual.clone(),
                    expression: expression.clone(),
                });
            }
        }
        for (individual, annotations) in &self.individual_annotations {
            for annotation in annotations {
                out.push(Axiom::IndividualAnnotation {
                    individual: individual.clone(),
                    annotation: annotation.clone(),
                });
            }
        }
        for (fact, annotations) in &self.facts {
            out.push(Axiom::Fact {
                fact: fact.clone(),
                annotations: annotations.clone(),
            });
        }
        out
    }

    // -----------------------------------------------------------------------
    // Edit planning
    // -----------------------------------------------------------------------

    /// Changes that add `annotations` to `target`, skipping ones already present.
    pub fn plan_add_annotations(
        &self,
        target: &AnnotationTarget,
        annotations: &[Annotation],
    ) -> Vec<Change> {
        match target {
            AnnotationTarget::Model => annotations
                .iter()
                .filter(|a| !self.annotations.contains(*a))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(|a| {
                    Change::Add(Axiom::ModelAnnotation {
                        annotation: a.clone(),
                    })
                })
                .collect(),
            AnnotationTarget::Individual(individual) => {
                let existing: BTreeSet<&Annotation> = self.annotations_of(individual).collect();
                annotations
                    .iter()
                    .filter(|a| !existing.contains(a))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .map(|a| {
                        Change::Add(Axiom::IndividualAnnotation {
                            individual: individual.clone(),
                            annotation: a.clone(),
                        })
                    })
                    .collect()
            }
            AnnotationTarget::Fact(fact) => {
                let Some(old) = self.facts.get(fact) else {
                    return Vec::new();
                };
                let mut new = old.clone();
                new.extend(annotations.iter().cloned());
                self.replace_fact(fact, old, new)
            }
        }
    }

    /// Changes that remove `annotations` from `target`. Removed reference
    /// values become orphan candidates.
    pub fn plan_remove_annotations(
        &self,
        target: &AnnotationTarget,
        annotations: &[Annotation],
    ) -> Removal {
        let wanted: BTreeSet<&Annotation> = annotations.iter().collect();
        let mut removal = Removal::default();
        match target {
            AnnotationTarget::Model => {
                for a in self.annotations.iter().filter(|a| wanted.contains(a)) {
                    removal.changes.push(Change::Remove(Axiom::ModelAnnotation {
                        annotation: a.clone(),
                    }));
                    removal.orphan_candidates.extend(a.referenced_individual());
                }
            }
            AnnotationTarget::Individual(individual) => {
                for a in self.annotations_of(individual).filter(|a| wanted.contains(a)) {
                    removal.changes.push(Change::Remove(Axiom::IndividualAnnotation {
                        individual: individual.clone(),
                        annotation: a.clone(),
                    }));
                    removal.orphan_candidates.extend(a.referenced_individual());
                }
            }
            AnnotationTarget::Fact(fact) => {
                if let Some(old) = self.facts.get(fact) {
                    let (removed, kept): (BTreeSet<Annotation>, BTreeSet<Annotation>) =
                        old.iter().cloned().partition(|a| wanted.contains(a));
                    removal
                        .orphan_candidates
                        .extend(removed.iter().filter_map(Annotation::referenced_individual));
                    removal.changes = self.replace_fact(fact, old, kept);
                }
            }
        }
        removal.orphan_candidates.sort();
        removal.orphan_candidates.dedup();
        removal
    }

    /// Changes that add a fact, merging annotations into an existing one.
    pub fn plan_add_fact(&self, fact: &FactKey, annotations: &[Annotation]) -> Vec<Change> {
        match self.facts.get(fact) {
            Some(_) => self.plan_add_annotations(&AnnotationTarget::Fact(fact.clone()), annotations),
            None => vec![Change::Add(Axiom::Fact {
                fact: fact.clone(),
                annotations: annotations.iter().cloned().collect(),
            })],
        }
    }

    /// Changes that remove a fact, or `None` if the model has no such fact.
    pub fn plan_remove_fact(&self, fact: &FactKey) -> Option<Removal> {
        let annotations = self.facts.get(fact)?;
        let mut orphan_candidates: Vec<IndividualId> = annotations
            .iter()
            .filter_map(Annotation::referenced_individual)
            .collect();
        orphan_candidates.sort();
        orphan_candidates.dedup();
        Some(Removal {
            changes: vec![Change::Remove(Axiom::Fact {
                fact: fact.clone(),
                annotations: annotations.clone(),
            })],
            orphan_candidates,
        })
    }

    /// Changes that delete an individual: its declaration, types and
    /// annotations, every fact touching it, and every annotation elsewhere
    /// whose value references it.
    pub fn plan_delete_individual(&self, individual: &IndividualId) -> Removal {
        let mut removal = Removal::default();

        for (fact, annotations) in &self.facts {
            if fact.touches(individual) {
                removal
                    .orphan_candidates
                    .extend(annotations.iter().filter_map(Annotation::referenced_individual));
                removal.changes.push(Change::Remove(Axiom::Fact {
                    fact: fact.clone(),
                    annotations: annotations.clone(),
                }));
            } else if annotations.iter().any(|a| a.value.references(individual)) {
                let kept = annotations
                    .iter()
                    .filter(|a| !a.value.references(individual))
                    .cloned()
                    .collect();
                removal
                    .changes
                    .extend(self.replace_fact(fact, annotations, kept));
            }
        }

        for (other, annotations) in &self.individual_annotations {
            if other == individual {
                continue;
            }
            for a in annotations.iter().filter(|a| a.value.references(individual)) {
                removal.changes.push(Change::Remove(Axiom::IndividualAnnotation {
                    individual: other.clone(),
                    annotation: a.clone(),
                }));
            }
        }

        for a in self.annotations.iter().filter(|a| a.value.references(individual)) {
            removal.changes.push(Change::Remove(Axiom::ModelAnnotation {
                annotation: a.clone(),
            }));
        }

        for a in self.annotations_of(individual) {
            removal.orphan_candidates.extend(a.referenced_individual());
            removal.changes.push(Change::Remove(Axiom::IndividualAnnotation {
                individual: individual.clone(),
                annotation: a.clone(),
            }));
        }

        for expression in self.types_of(individual) {
            removal.changes.push(Change::Remove(Axiom::ClassAssertion {
                individual: individual.clone(),
                expression: expression.clone(),
            }));
        }

        if self.individuals.contains(individual) {
            removal.changes.push(Change::Remove(Axiom::Declaration {
                individual: individual.clone(),
            }));
        }

        removal.orphan_candidates.retain(|c| c != individual);
        removal.orphan_candidates.sort();
        removal.orphan_candidates.dedup();
        removal
    }

    /// Changes that delete every candidate left without any referent (an
    /// annotation pointing at it or a fact using it), transitively.
    ///
    /// Traversal is breadth-first: the initial candidates are visited in
    /// sorted order, and the candidates uncovered by each deletion are
    /// queued (sorted) behind those already waiting. A candidate that is
    /// still referenced when visited is skipped, but is visited again if a
    /// later deletion uncovers it.
    pub fn plan_sweep(&self, candidates: &[IndividualId]) -> Vec<Change> {
        let mut initial = candidates.to_vec();
        initial.sort();
        initial.dedup();
        let mut queue: VecDeque<IndividualId> = initial.into();
        let mut scratch = self.clone();
        let mut changes = Vec::new();

        while let Some(candidate) = queue.pop_front() {
            if !scratch.contains_individual(&candidate) || scratch.is_referenced(&candidate) {
                continue;
            }
            let removal = scratch.plan_delete_individual(&candidate);
            for change in &removal.changes {
                scratch.apply(change);
            }
            changes.extend(removal.changes);
            queue.extend(removal.orphan_candidates);
        }
        changes
    }

    fn replace_fact(
        &self,
        fact: &FactKey,
        old: &BTreeSet<Annotation>,
        new: BTreeSet<Annotation>,
    ) -> Vec<Change> {
        if old == &new {
            return Vec::new();
        }
        vec![
            Change::Remove(Axiom::Fact {
                fact: fact.clone(),
                annotations: old.clone(),
            }),
            Change::Add(Axiom::Fact {
                fact: fact.clone(),
                annotations: new,
            }),
        ]
    }
}

fn remove_from<K: Ord, V: Ord>(map: &mut BTreeMap<K, BTreeSet<V>>, key: &K, value: &V) -> bool {
    let Some(set) = map.get_mut(key) else {
        return false;
    };
    let removed = set.remove(value);
    if set.is_empty() {
        map.remove(key);
    }
    removed
}
