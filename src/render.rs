//! JSON rendering of models for batch responses.
//!
//! [`Renderer`] turns a [`Model`] (or the part of it a batch touched) into
//! the individual, fact and property lists clients reconcile against.
//! Labels come from a [`LabelResolver`] supplied at construction.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::IndividualId;
use crate::lookup::LabelResolver;
use crate::model::{Annotation, AnnotationValue, ClassExpression, Model};
use crate::reasoner::Reasoner;

/// A rendered class expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonClassExpression {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<JsonProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filler: Option<Box<JsonClassExpression>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expressions: Option<Vec<JsonClassExpression>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonProperty {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonAnnotation {
    pub key: String,
    pub value: String,
    #[serde(
        rename = "value-type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub value_type: Option<String>,
}

impl From<&Annotation> for JsonAnnotation {
    fn from(a: &Annotation) -> Self {
        let value_type = match a.value {
            AnnotationValue::Reference(_) => Some("IRI".to_string()),
            AnnotationValue::Literal(_) => None,
        };
        Self {
            key: a.key.clone(),
            value: a.value.as_str().to_string(),
            value_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonIndividual {
    pub id: String,
    #[serde(rename = "type")]
    pub types: Vec<JsonClassExpression>,
    #[serde(default)]
    pub annotations: Vec<JsonAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonFact {
    pub subject: String,
    pub property: String,
    #[serde(
        rename = "property-label",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub property_label: Option<String>,
    pub object: String,
    #[serde(default)]
    pub annotations: Vec<JsonAnnotation>,
}

/// Individuals, facts and the properties those facts use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedGraph {
    pub individuals: Vec<JsonIndividual>,
    pub facts: Vec<JsonFact>,
    pub properties: Vec<JsonProperty>,
}

pub trait Renderer: Send + Sync {
    /// The whole model.
    fn render_model(&self, model: &Model) -> RenderedGraph;

    /// The given individuals and every fact touching one of them.
    fn render_individuals(&self, model: &Model, individuals: &BTreeSet<IndividualId>)
    -> RenderedGraph;

    /// Inferred types for every individual, or only `only` when given.
    fn render_model_inferences(
        &self,
        model: &Model,
        reasoner: &dyn Reasoner,
        only: Option<&BTreeSet<IndividualId>>,
    ) -> Vec<JsonIndividual>;

    fn render_model_annotations(&self, model: &Model) -> Vec<JsonAnnotation> {
        model.annotations().iter().map(JsonAnnotation::from).collect()
    }
}

pub struct JsonRenderer {
    labels: Arc<dyn LabelResolver>,
}

impl JsonRenderer {
    pub fn new(labels: Arc<dyn LabelResolver>) -> Self {
        Self { labels }
    }

    fn property(&self, id: &str) -> JsonProperty {
        JsonProperty {
            id: id.to_string(),
            label: self.labels.label(id),
        }
    }

    pub fn class_expression(&self, expression: &ClassExpression) -> JsonClassExpression {
        let empty = |kind: &str| JsonClassExpression {
            kind: kind.to_string(),
            id: None,
            label: None,
            property: None,
            filler: None,
            expressions: None,
        };
        match expression {
            ClassExpression::Class { id } => JsonClassExpression {
                id: Some(id.clone()),
                label: self.labels.label(id),
                ..empty("class")
            },
            ClassExpression::SomeValuesFrom { property, filler } => JsonClassExpression {
                property: Some(self.property(property)),
                filler: Some(Box::new(self.class_expression(filler))),
                ..empty("svf")
            },
            ClassExpression::Intersection { expressions } => JsonClassExpression {
                expressions: Some(expressions.iter().map(|e| self.class_expression(e)).collect()),
                ..empty("intersection")
            },
            ClassExpression::Union { expressions } => JsonClassExpression {
                expressions: Some(expressions.iter().map(|e| self.class_expression(e)).collect()),
                ..empty("union")
            },
        }
    }

    fn individual(&self, model: &Model, id: &IndividualId) -> JsonIndividual {
        JsonIndividual {
            id: id.to_string(),
            types: model
                .types_of(id)
                .map(|t| self.class_expression(t))
                .collect(),
            annotations: model.annotations_of(id).map(JsonAnnotation::from).collect(),
        }
    }

    fn graph<'a>(
        &self,
        model: &Model,
        individuals: impl Iterator<Item = &'a IndividualId>,
        include_fact: impl Fn(&crate::model::FactKey) -> bool,
    ) -> RenderedGraph {
        let individuals: Vec<JsonIndividual> = individuals
            .filter(|id| model.contains_individual(id))
            .map(|id| self.individual(model, id))
            .collect();

        let mut used = BTreeSet::new();
        let facts: Vec<JsonFact> = model
            .facts()
            .filter(|(key, _)| include_fact(key))
            .map(|(key, annotations)| {
                used.insert(key.predicate.clone());
                JsonFact {
                    subject: key.subject.to_string(),
                    property: key.predicate.clone(),
                    property_label: self.labels.label(&key.predicate),
                    object: key.object.to_string(),
                    annotations: annotations.iter().map(JsonAnnotation::from).collect(),
                }
            })
            .collect();

        RenderedGraph {
            individuals,
            facts,
            properties: used.iter().map(|p| self.property(p)).collect(),
        }
    }
}

impl Renderer for JsonRenderer {
    fn render_model(&self, model: &Model) -> RenderedGraph {
        self.graph(model, model.individuals(), |_| true)
    }

    fn render_individuals(
        &self,
        model: &Model,
        individuals: &BTreeSet<IndividualId>,
    ) -> RenderedGraph {
        self.graph(model, individuals.iter(), |key| {
            individuals.contains(&key.subject) || individuals.contains(&key.object)
        })
    }

    fn render_model_inferences(
        &self,
        model: &Model,
        reasoner: &dyn Reasoner,
        only: Option<&BTreeSet<IndividualId>>,
    ) -> Vec<JsonIndividual> {
        model
            .individuals()
            .filter(|id| only.is_none_or(|set| set.contains(*id)))
            .map(|id| JsonIndividual {
                id: id.to_string(),
                types: reasoner
                    .get_types(model.id(), id)
                    .into_iter()
                    .map(|class| self.class_expression(&ClassExpression::class(class)))
                    .collect(),
                annotations: Vec::new(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ModelId;
    use crate::model::{Axiom, Change, FactKey};
    use crate::reasoner::StructuralReasoner;
    use crate::vocabulary::Vocabulary;

    fn renderer() -> JsonRenderer {
        JsonRenderer::new(Arc::new(Vocabulary::builtin()))
    }

    fn sample() -> Model {
        let mut model = Model::new(ModelId::from("gomodel:r"));
        for (id, class) in [("a", "GO:0004672"), ("b", "GO:0006915"), ("c", "GO:0005634")] {
            model.apply(&Change::Add(Axiom::Declaration {
                individual: IndividualId::from(id),
            }));
            model.apply(&Change::Add(Axiom::ClassAssertion {
                individual: IndividualId::from(id),
                expression: ClassExpression::class(class),
            }));
        }
        model.apply(&Change::Add(Axiom::Fact {
            fact: FactKey::new(IndividualId::from("a"), "BFO:0000050", IndividualId::from("b")),
            annotations: [Annotation::reference("evidence", "c")].into_iter().collect(),
        }));
        model
    }

    #[test]
    fn renders_whole_model_with_labels() {
        let graph = renderer().render_model(&sample());
        assert_eq!(graph.individuals.len(), 3);
        assert_eq!(graph.facts.len(), 1);
        assert_eq!(graph.facts[0].property_label.as_deref(), Some("part of"));
        assert_eq!(graph.facts[0].annotations[0].value_type.as_deref(), Some("IRI"));
        assert_eq!(graph.properties.len(), 1);
        assert_eq!(
            graph.individuals[0].types[0].label.as_deref(),
            Some("protein kinase activity")
        );
    }

    #[test]
    fn merge_rendering_is_limited_to_relevant_individuals() {
        let relevant: BTreeSet<_> = [IndividualId::from("c")].into_iter().collect();
        let graph = renderer().render_individuals(&sample(), &relevant);
        assert_eq!(graph.individuals.len(), 1);
        assert!(graph.facts.is_empty());

        let relevant: BTreeSet<_> = [IndividualId::from("a")].into_iter().collect();
        let graph = renderer().render_individuals(&sample(), &relevant);
        assert_eq!(graph.facts.len(), 1);
    }

    #[test]
    fn svf_is_rendered_with_property_and_filler() {
        let expr = ClassExpression::SomeValuesFrom {
            property: "BFO:0000066".into(),
            filler: Box::new(ClassExpression::class("GO:0005634")),
        };
        let json = renderer().class_expression(&expr);
        assert_eq!(json.kind, "svf");
        assert_eq!(json.property.unwrap().label.as_deref(), Some("occurs in"));
        assert_eq!(json.filler.unwrap().id.as_deref(), Some("GO:0005634"));
    }

    #[test]
    fn inferences_come_from_reasoner() {
        let model = sample();
        let reasoner = StructuralReasoner::new(Arc::new(Vocabulary::builtin()));
        reasoner.flush(&model);
        let inferred = renderer().render_model_inferences(&model, &reasoner, None);
        assert_eq!(inferred.len(), 3);
        let a = inferred.iter().find(|i| i.id == "a").unwrap();
        assert!(a.types.iter().any(|t| t.id.as_deref() == Some("GO:0003674")));
    }
}
