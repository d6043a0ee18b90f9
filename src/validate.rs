//! Pre-save validation of models.

use crate::model::{AnnotationShorthand, Model};

pub trait Validator: Send + Sync {
    /// Human-readable issues; empty means the model may be saved.
    fn validate(&self, model: &Model) -> Vec<String>;
}

/// Requires a title and at least one contributor on the model.
#[derive(Debug, Default, Clone, Copy)]
pub struct BeforeSaveValidator;

impl Validator for BeforeSaveValidator {
    fn validate(&self, model: &Model) -> Vec<String> {
        let has = |key: AnnotationShorthand| {
            model
                .annotations()
                .iter()
                .any(|a| a.shorthand_key() == Some(key) && !a.value.as_str().trim().is_empty())
        };
        let mut issues = Vec::new();
        if !has(AnnotationShorthand::Title) {
            issues.push("The model has no title. All models must have a human readable title.".to_string());
        }
        if !has(AnnotationShorthand::Contributor) {
            issues.push("The model has no contributors. All models must have an association with their contributors.".to_string());
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ModelId;
    use crate::model::{Annotation, Axiom, Change};

    #[test]
    fn empty_model_has_two_issues() {
        let model = Model::new(ModelId::from("gomodel:v"));
        let issues = BeforeSaveValidator.validate(&model);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("title"));
        assert!(issues[1].contains("no contributors"));
    }

    #[test]
    fn complete_model_passes() {
        let mut model = Model::new(ModelId::from("gomodel:v"));
        for a in [
            Annotation::shorthand(AnnotationShorthand::Title, "Apoptosis"),
            Annotation::shorthand(AnnotationShorthand::Contributor, "orcid:1"),
        ] {
            model.apply(&Change::Add(Axiom::ModelAnnotation { annotation: a }));
        }
        assert!(BeforeSaveValidator.validate(&model).is_empty());
    }
}
