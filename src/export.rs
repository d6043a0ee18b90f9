//! Legacy tab-separated export (GAF 2.1 and GPAD 1.1 layouts).
//!
//! Only the activity-centred core of a model is exported: every
//! `enabled by` fact yields a molecular-function row for the gene product,
//! and `part of` / `occurs in` facts leaving the same activity yield
//! process and component rows. Evidence comes from the `evidence`
//! annotation on the fact that produced the row.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::BatchError;
use crate::ids::IndividualId;
use crate::lookup::LabelResolver;
use crate::model::{Annotation, AnnotationShorthand, FactKey, Model};
use crate::vocabulary::Vocabulary;

pub const ENABLED_BY: &str = "RO:0002333";
pub const PART_OF: &str = "BFO:0000050";
pub const OCCURS_IN: &str = "BFO:0000066";

const MOLECULAR_FUNCTION: &str = "GO:0003674";
const BIOLOGICAL_PROCESS: &str = "GO:0008150";
const CELLULAR_COMPONENT: &str = "GO:0005575";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyFormat {
    #[default]
    Gaf,
    Gpad,
}

impl FromStr for LegacyFormat {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gaf" => Ok(LegacyFormat::Gaf),
            "gpad" => Ok(LegacyFormat::Gpad),
            _ => Err(BatchError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Row {
    gene_product: String,
    term: String,
    aspect: char,
    qualifier: &'static str,
    evidence: String,
    reference: String,
    date: String,
    assigned_by: String,
}

/// Render `model` in the given legacy layout, header line included.
pub fn export_legacy(
    model: &Model,
    format: LegacyFormat,
    vocabulary: &Vocabulary,
    labels: &dyn LabelResolver,
) -> String {
    let rows = collect_rows(model, vocabulary);
    let taxon = model
        .annotations()
        .iter()
        .find(|a| a.shorthand_key() == Some(AnnotationShorthand::Taxon))
        .map(|a| a.value.as_str().replace("NCBITaxon:", "taxon:"))
        .unwrap_or_default();

    let mut out = String::new();
    match format {
        LegacyFormat::Gaf => {
            out.push_str("!gaf-version: 2.1\n");
            for row in &rows {
                let (db, id) = split_curie(&row.gene_product);
                let symbol = labels
                    .label(&row.gene_product)
                    .unwrap_or_else(|| id.to_string());
                let _ = writeln!(
                    out,
                    "{db}\t{id}\t{symbol}\t{}\t{}\t{}\t{}\t\t{}\t\t\tprotein\t{taxon}\t{}\t{}",
                    row.qualifier,
                    row.term,
                    row.reference,
                    evidence_code(&row.evidence),
                    row.aspect,
                    row.date,
                    row.assigned_by,
                );
            }
        }
        LegacyFormat::Gpad => {
            out.push_str("!gpad-version: 1.1\n");
            for row in &rows {
                let (db, id) = split_curie(&row.gene_product);
                let _ = writeln!(
                    out,
                    "{db}\t{id}\t{}\t{}\t{}\t{}\t\t\t{}\t{}\t\t",
                    row.qualifier, row.term, row.reference, row.evidence, row.date, row.assigned_by,
                );
            }
        }
    }
    out
}

fn collect_rows(model: &Model, vocabulary: &Vocabulary) -> Vec<Row> {
    let model_date = shorthand_value(model.annotations().iter(), AnnotationShorthand::Date);
    let model_contributor =
        shorthand_value(model.annotations().iter(), AnnotationShorthand::Contributor);

    let mut rows = Vec::new();
    for (key, _) in model.facts().filter(|(k, _)| k.predicate == ENABLED_BY) {
        let activity = &key.subject;
        let row = |term: &str, aspect: char, qualifier: &'static str, fact: &FactKey| {
            let annotations = model.fact_annotations(fact);
            let (evidence, reference) = annotations
                .map(|a| evidence_of(model, a.iter()))
                .unwrap_or_default();
            let date = annotations
                .and_then(|a| shorthand_value(a.iter(), AnnotationShorthand::Date))
                .or_else(|| model_date.clone())
                .unwrap_or_default()
                .replace('-', "");
            let assigned_by = annotations
                .and_then(|a| shorthand_value(a.iter(), AnnotationShorthand::Contributor))
                .or_else(|| model_contributor.clone())
                .unwrap_or_default();
            (term.to_string(), aspect, qualifier, evidence, reference, date, assigned_by)
        };

        let mut terms = Vec::new();
        for class in named_classes(model, activity) {
            if aspect_of(vocabulary, &class) == Some('F') {
                terms.push(row(&class, 'F', "enables", key));
            }
        }
        for (other, _) in model.facts().filter(|(k, _)| &k.subject == activity) {
            let (aspect, qualifier) = match other.predicate.as_str() {
                PART_OF => ('P', "involved_in"),
                OCCURS_IN => ('C', "located_in"),
                _ => continue,
            };
            for class in named_classes(model, &other.object) {
                if aspect_of(vocabulary, &class) == Some(aspect) {
                    terms.push(row(&class, aspect, qualifier, other));
                }
            }
        }

        for gene_product in named_classes(model, &key.object) {
            for (term, aspect, qualifier, evidence, reference, date, assigned_by) in &terms {
                rows.push(Row {
                    gene_product: gene_product.clone(),
                    term: term.clone(),
                    aspect: *aspect,
                    qualifier: *qualifier,
                    evidence: evidence.clone(),
                    reference: reference.clone(),
                    date: date.clone(),
                    assigned_by: assigned_by.clone(),
                });
            }
        }
    }
    rows.sort();
    rows.dedup();
    rows
}

fn named_classes(model: &Model, individual: &IndividualId) -> Vec<String> {
    model
        .types_of(individual)
        .filter_map(|t| t.as_class().map(str::to_string))
        .collect()
}

fn aspect_of(vocabulary: &Vocabulary, class: &str) -> Option<char> {
    let ancestors = vocabulary.ancestors(class);
    if ancestors.contains(MOLECULAR_FUNCTION) {
        Some('F')
    } else if ancestors.contains(BIOLOGICAL_PROCESS) {
        Some('P')
    } else if ancestors.contains(CELLULAR_COMPONENT) {
        Some('C')
    } else {
        None
    }
}

fn shorthand_value<'a>(
    mut annotations: impl Iterator<Item = &'a Annotation>,
    key: AnnotationShorthand,
) -> Option<String> {
    annotations
        .find(|a| a.shorthand_key() == Some(key))
        .map(|a| a.value.as_str().to_string())
}

/// Evidence class and source of the first `evidence` annotation. A value
/// that is not an individual of the model is taken as the evidence class.
fn evidence_of<'a>(
    model: &Model,
    mut annotations: impl Iterator<Item = &'a Annotation>,
) -> (String, String) {
    let Some(evidence) = annotations.find(|a| a.shorthand_key() == Some(AnnotationShorthand::Evidence))
    else {
        return Default::default();
    };
    let individual = IndividualId::new(evidence.value.as_str());
    if !model.contains_individual(&individual) {
        return (evidence.value.as_str().to_string(), String::new());
    }
    let class = named_classes(model, &individual)
        .into_iter()
        .next()
        .unwrap_or_default();
    let source = shorthand_value(model.annotations_of(&individual), AnnotationShorthand::Source)
        .unwrap_or_default();
    (class, source)
}

/// Three-letter GAF evidence code for the ECO classes we know about.
fn evidence_code(eco: &str) -> &str {
    match eco {
        "ECO:0000314" => "IDA",
        "ECO:0000353" => "IPI",
        "ECO:0000315" => "IMP",
        "ECO:0000316" => "IGI",
        "ECO:0000270" => "IEP",
        "ECO:0000250" => "ISS",
        "ECO:0000304" => "TAS",
        "ECO:0000303" => "NAS",
        "ECO:0000305" => "IC",
        "ECO:0000501" => "IEA",
        other => other,
    }
}

fn split_curie(id: &str) -> (&str, &str) {
    id.split_once(':').unwrap_or(("", id))
}
