//! Class expressions: the types asserted on individuals.
//!
//! Clients send expressions as loosely-typed JSON objects
//! (`{"type": "svf", "onProp": "...", "literal": "..."}`). The
//! [`ExpressionParser`] validates those into the closed [`ClassExpression`]
//! tree, optionally checking class ids against the vocabulary.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ExpressionError;
use crate::vocabulary::Vocabulary;

/// A validated class expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClassExpression {
    /// A named class, e.g. `GO:0003674`.
    Class { id: String },
    /// Existential restriction: some values of `property` are `filler`.
    #[serde(rename = "svf")]
    SomeValuesFrom {
        property: String,
        filler: Box<ClassExpression>,
    },
    Intersection { expressions: Vec<ClassExpression> },
    Union { expressions: Vec<ClassExpression> },
}

impl ClassExpression {
    pub fn class(id: impl Into<String>) -> Self {
        ClassExpression::Class { id: id.into() }
    }

    /// The class id if this is a plain named class.
    pub fn as_class(&self) -> Option<&str> {
        match self {
            ClassExpression::Class { id } => Some(id),
            _ => None,
        }
    }

    /// Named classes an instance of this expression is directly asserted to
    /// belong to. Restrictions and unions contribute nothing; intersections
    /// contribute each named operand.
    pub fn asserted_classes(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_asserted(&mut out);
        out
    }

    fn collect_asserted<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            ClassExpression::Class { id } => {
                out.insert(id);
            }
            ClassExpression::Intersection { expressions } => {
                for e in expressions {
                    e.collect_asserted(out);
                }
            }
            ClassExpression::SomeValuesFrom { .. } | ClassExpression::Union { .. } => {}
        }
    }

    /// Every class id mentioned anywhere in the expression.
    pub fn signature(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_signature(&mut out);
        out
    }

    fn collect_signature<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            ClassExpression::Class { id } => {
                out.insert(id);
            }
            ClassExpression::SomeValuesFrom { filler, .. } => filler.collect_signature(out),
            ClassExpression::Intersection { expressions }
            | ClassExpression::Union { expressions } => {
                for e in expressions {
                    e.collect_signature(out);
                }
            }
        }
    }
}

/// Class expression as it appears in a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionArgument {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_prop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expressions: Option<Vec<ExpressionArgument>>,
}

impl ExpressionArgument {
    /// Shorthand for a `{"type": "class", "literal": id}` argument.
    pub fn class(id: impl Into<String>) -> Self {
        Self {
            kind: Some("class".into()),
            literal: Some(id.into()),
            ..Default::default()
        }
    }

    /// Shorthand for a `{"type": "svf", "onProp": property, "literal": filler}` argument.
    pub fn svf(property: impl Into<String>, filler: impl Into<String>) -> Self {
        Self {
            kind: Some("svf".into()),
            literal: Some(filler.into()),
            on_prop: Some(property.into()),
            expressions: None,
        }
    }
}

/// Turns request expressions into [`ClassExpression`]s.
pub struct ExpressionParser<'a> {
    vocabulary: Option<&'a Vocabulary>,
}

impl<'a> ExpressionParser<'a> {
    /// A parser that accepts any class id.
    pub fn lenient() -> Self {
        Self { vocabulary: None }
    }

    /// A parser that rejects class ids missing from `vocabulary`.
    pub fn checked(vocabulary: &'a Vocabulary) -> Self {
        Self {
            vocabulary: Some(vocabulary),
        }
    }

    /// Parse a non-empty list of expressions, one result per element.
    pub fn parse_all(
        &self,
        args: &[ExpressionArgument],
    ) -> Result<Vec<ClassExpression>, ExpressionError> {
        if args.is_empty() {
            return Err(ExpressionError::Empty);
        }
        args.iter().map(|a| self.parse(a)).collect()
    }

    pub fn parse(&self, arg: &ExpressionArgument) -> Result<ClassExpression, ExpressionError> {
        let kind = arg
            .kind
            .as_deref()
            .ok_or(ExpressionError::MissingField { field: "type" })?;
        match kind {
            "class" => {
                let id = arg
                    .literal
                    .as_deref()
                    .ok_or(ExpressionError::MissingField { field: "literal" })?;
                self.class(id)
            }
            "svf" => {
                let property = arg
                    .on_prop
                    .clone()
                    .ok_or(ExpressionError::MissingField { field: "onProp" })?;
                let filler = match (&arg.expressions, &arg.literal) {
                    (Some(nested), _) => self.combine(nested, Combinator::Intersection)?,
                    (None, Some(literal)) => self.class(literal)?,
                    (None, None) => {
                        return Err(ExpressionError::MissingField { field: "literal" });
                    }
                };
                Ok(ClassExpression::SomeValuesFrom {
                    property,
                    filler: Box::new(filler),
                })
            }
            "intersection" => {
                let nested = arg
                    .expressions
                    .as_deref()
                    .ok_or(ExpressionError::MissingField { field: "expressions" })?;
                self.combine(nested, Combinator::Intersection)
            }
            "union" => {
                let nested = arg
                    .expressions
                    .as_deref()
                    .ok_or(ExpressionError::MissingField { field: "expressions" })?;
                self.combine(nested, Combinator::Union)
            }
            other => Err(ExpressionError::UnknownType {
                kind: other.to_string(),
            }),
        }
    }

    fn class(&self, id: &str) -> Result<ClassExpression, ExpressionError> {
        if let Some(vocabulary) = self.vocabulary {
            if !vocabulary.has_class(id) {
                return Err(ExpressionError::UnknownClass { id: id.to_string() });
            }
        }
        Ok(ClassExpression::class(id))
    }

    fn combine(
        &self,
        args: &[ExpressionArgument],
        combinator: Combinator,
    ) -> Result<ClassExpression, ExpressionError> {
        let mut parsed = self.parse_all(args)?;
        if parsed.len() == 1 {
            return Ok(parsed.remove(0));
        }
        Ok(match combinator {
            Combinator::Intersection => ClassExpression::Intersection { expressions: parsed },
            Combinator::Union => ClassExpression::Union { expressions: parsed },
        })
    }
}

#[derive(Clone, Copy)]
enum Combinator {
    Intersection,
    Union,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_class() {
        let parser = ExpressionParser::lenient();
        let expr = parser.parse(&ExpressionArgument::class("GO:0003674")).unwrap();
        assert_eq!(expr, ClassExpression::class("GO:0003674"));
    }

    #[test]
    fn svf_with_literal_filler() {
        let parser = ExpressionParser::lenient();
        let expr = parser
            .parse(&ExpressionArgument::svf("BFO:0000050", "GO:0008150"))
            .unwrap();
        match expr {
            ClassExpression::SomeValuesFrom { property, filler } => {
                assert_eq!(property, "BFO:0000050");
                assert_eq!(*filler, ClassExpression::class("GO:0008150"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn svf_with_nested_expressions_becomes_intersection() {
        let parser = ExpressionParser::lenient();
        let arg = ExpressionArgument {
            kind: Some("svf".into()),
            on_prop: Some("RO:0002333".into()),
            expressions: Some(vec![
                ExpressionArgument::class("GO:0005575"),
                ExpressionArgument::class("GO:0008150"),
            ]),
            ..Default::default()
        };
        let expr = parser.parse(&arg).unwrap();
        let ClassExpression::SomeValuesFrom { filler, .. } = expr else {
            panic!("expected svf");
        };
        assert!(matches!(*filler, ClassExpression::Intersection { ref expressions } if expressions.len() == 2));
    }

    #[test]
    fn single_element_intersection_collapses() {
        let parser = ExpressionParser::lenient();
        let arg = ExpressionArgument {
            kind: Some("intersection".into()),
            expressions: Some(vec![ExpressionArgument::class("GO:0003674")]),
            ..Default::default()
        };
        assert_eq!(parser.parse(&arg).unwrap(), ClassExpression::class("GO:0003674"));
    }

    #[test]
    fn empty_list_is_rejected() {
        let parser = ExpressionParser::lenient();
        assert!(matches!(parser.parse_all(&[]), Err(ExpressionError::Empty)));
    }

    #[test]
    fn missing_fields_are_reported() {
        let parser = ExpressionParser::lenient();
        let no_type = ExpressionArgument {
            literal: Some("GO:1".into()),
            ..Default::default()
        };
        assert!(matches!(
            parser.parse(&no_type),
            Err(ExpressionError::MissingField { field: "type" })
        ));
        let no_prop = ExpressionArgument {
            kind: Some("svf".into()),
            literal: Some("GO:1".into()),
            ..Default::default()
        };
        assert!(matches!(
            parser.parse(&no_prop),
            Err(ExpressionError::MissingField { field: "onProp" })
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let parser = ExpressionParser::lenient();
        let arg = ExpressionArgument {
            kind: Some("complement".into()),
            ..Default::default()
        };
        assert!(matches!(parser.parse(&arg), Err(ExpressionError::UnknownType { .. })));
    }

    #[test]
    fn checked_parser_rejects_unknown_classes() {
        let vocabulary = Vocabulary::builtin();
        let parser = ExpressionParser::checked(&vocabulary);
        assert!(parser.parse(&ExpressionArgument::class("GO:0003674")).is_ok());
        assert!(matches!(
            parser.parse(&ExpressionArgument::class("GO:9999999")),
            Err(ExpressionError::UnknownClass { .. })
        ));
    }

    #[test]
    fn asserted_classes_skip_restrictions() {
        let expr = ClassExpression::Intersection {
            expressions: vec![
                ClassExpression::class("GO:0003674"),
                ClassExpression::SomeValuesFrom {
                    property: "BFO:0000050".into(),
                    filler: Box::new(ClassExpression::class("GO:0008150")),
                },
            ],
        };
        let asserted = expr.asserted_classes();
        assert_eq!(asserted.len(), 1);
        assert!(asserted.contains("GO:0003674"));
        assert_eq!(expr.signature().len(), 2);
    }
}
