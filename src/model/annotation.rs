//! Annotations and the reserved shorthand keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::IndividualId;

/// Value of an annotation: a plain literal or a reference to an individual
/// (or any other IRI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationValue {
    Literal(String),
    Reference(String),
}

impl AnnotationValue {
    pub fn as_str(&self) -> &str {
        match self {
            AnnotationValue::Literal(s) | AnnotationValue::Reference(s) => s,
        }
    }

    /// Whether this value points at `individual`.
    pub fn references(&self, individual: &IndividualId) -> bool {
        matches!(self, AnnotationValue::Reference(r) if r == individual.as_str())
    }
}

/// A key/value pair on a model, individual or fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Annotation {
    pub key: String,
    pub value: AnnotationValue,
}

impl Annotation {
    pub fn literal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AnnotationValue::Literal(value.into()),
        }
    }

    pub fn reference(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AnnotationValue::Reference(value.into()),
        }
    }

    pub fn shorthand(key: AnnotationShorthand, value: impl Into<String>) -> Self {
        Self::literal(key.label(), value)
    }

    /// The shorthand this annotation's key maps to, if any.
    pub fn shorthand_key(&self) -> Option<AnnotationShorthand> {
        self.key.parse().ok()
    }

    /// The referenced individual, if the value is a reference.
    pub fn referenced_individual(&self) -> Option<IndividualId> {
        match &self.value {
            AnnotationValue::Reference(r) => Some(IndividualId::new(r.clone())),
            AnnotationValue::Literal(_) => None,
        }
    }
}

/// Reserved annotation keys with special handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotationShorthand {
    Contributor,
    Date,
    Evidence,
    Source,
    Comment,
    Title,
    Deprecated,
    LayoutHintX,
    LayoutHintY,
    Taxon,
}

impl AnnotationShorthand {
    pub const ALL: [AnnotationShorthand; 10] = [
        AnnotationShorthand::Contributor,
        AnnotationShorthand::Date,
        AnnotationShorthand::Evidence,
        AnnotationShorthand::Source,
        AnnotationShorthand::Comment,
        AnnotationShorthand::Title,
        AnnotationShorthand::Deprecated,
        AnnotationShorthand::LayoutHintX,
        AnnotationShorthand::LayoutHintY,
        AnnotationShorthand::Taxon,
    ];

    /// Canonical key stored on annotations.
    pub fn label(self) -> &'static str {
        match self {
            AnnotationShorthand::Contributor => "contributor",
            AnnotationShorthand::Date => "date",
            AnnotationShorthand::Evidence => "evidence",
            AnnotationShorthand::Source => "source",
            AnnotationShorthand::Comment => "comment",
            AnnotationShorthand::Title => "title",
            AnnotationShorthand::Deprecated => "deprecated",
            AnnotationShorthand::LayoutHintX => "layout-hint-x",
            AnnotationShorthand::LayoutHintY => "layout-hint-y",
            AnnotationShorthand::Taxon => "taxon",
        }
    }
}

impl fmt::Display for AnnotationShorthand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AnnotationShorthand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" | "hint-layout-x" => return Ok(AnnotationShorthand::LayoutHintX),
            "y" | "hint-layout-y" => return Ok(AnnotationShorthand::LayoutHintY),
            _ => {}
        }
        AnnotationShorthand::ALL
            .into_iter()
            .find(|s2| s2.label() == s)
            .ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_labels_round_trip() {
        for s in AnnotationShorthand::ALL {
            assert_eq!(s.label().parse::<AnnotationShorthand>(), Ok(s));
        }
    }

    #[test]
    fn layout_aliases() {
        assert_eq!("x".parse(), Ok(AnnotationShorthand::LayoutHintX));
        assert_eq!("y".parse(), Ok(AnnotationShorthand::LayoutHintY));
        assert!("colour".parse::<AnnotationShorthand>().is_err());
    }

    #[test]
    fn reference_detection() {
        let ind = IndividualId::from("gomodel:1/2");
        let a = Annotation::reference("evidence", "gomodel:1/2");
        assert!(a.value.references(&ind));
        assert_eq!(a.referenced_individual(), Some(ind.clone()));
        assert!(!Annotation::literal("evidence", "gomodel:1/2").value.references(&ind));
    }
}
