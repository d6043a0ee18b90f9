//! Batch-local variable bindings.
//!
//! A request may name the individual it creates or touches with
//! `assignToVariable`; later requests in the same batch can then use that
//! name wherever an individual id is expected. Variables shadow literal ids
//! and are dropped when the batch ends.

use std::collections::HashMap;

use crate::error::{BatchError, M3Result};
use crate::ids::{IndividualId, ModelId};
use crate::model::{Annotation, AnnotationShorthand};
use crate::request::ValueArgument;
use crate::store::ModelStore;

#[derive(Debug, Default, Clone)]
pub struct VariableBindings {
    bound: HashMap<String, IndividualId>,
}

impl VariableBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `individual`, replacing any earlier binding.
    pub fn bind(&mut self, name: impl Into<String>, individual: IndividualId) {
        self.bound.insert(name.into(), individual);
    }

    /// Bind only when a name was supplied.
    pub fn bind_opt(&mut self, name: Option<&str>, individual: &IndividualId) {
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            self.bind(name, individual.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&IndividualId> {
        self.bound.get(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bound.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// Resolve a token to an individual of `model`.
    ///
    /// A bound variable wins. Otherwise the token is taken as a literal id,
    /// which must name an existing individual.
    pub fn resolve(
        &self,
        token: &str,
        store: &dyn ModelStore,
        model: &ModelId,
    ) -> M3Result<IndividualId> {
        if let Some(bound) = self.get(token) {
            return Ok(bound.clone());
        }
        let literal = IndividualId::new(token);
        if store.contains_individual(model, &literal)? {
            Ok(literal)
        } else {
            Err(BatchError::UnknownReference {
                token: token.to_string(),
            }
            .into())
        }
    }

    /// Turn request `values` into annotations.
    ///
    /// `evidence` values become references, through the bindings when the
    /// value names a variable. Other shorthand keys are normalised to their
    /// canonical spelling; unknown keys are kept verbatim as literals.
    pub fn annotations(&self, values: &[ValueArgument]) -> Vec<Annotation> {
        values
            .iter()
            .map(|v| match v.key.parse::<AnnotationShorthand>() {
                Ok(AnnotationShorthand::Evidence) => {
                    let target = self
                        .get(&v.value)
                        .map(|id| id.as_str().to_string())
                        .unwrap_or_else(|| v.value.clone());
                    Annotation::reference(AnnotationShorthand::Evidence.label(), target)
                }
                Ok(shorthand) => Annotation::shorthand(shorthand, v.value.clone()),
                Err(()) => Annotation::literal(v.key.clone(), v.value.clone()),
            })
            .collect()
    }
}
