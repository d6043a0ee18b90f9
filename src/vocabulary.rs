//! Global vocabulary: classes, relations and evidence types.
//!
//! The vocabulary backs the `relations/get` and `evidence/get` meta
//! operations, label resolution in rendered responses, the optional class
//! id check on incoming expressions, and the structural reasoner's
//! subclass and disjointness knowledge. It is read from the `[vocabulary]`
//! table of the engine config, falling back to [`Vocabulary::builtin`].

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

/// A class with its direct superclasses and declared disjoint classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub disjoint_with: Vec<String>,
}

/// An object property usable as a fact predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntry {
    pub id: String,
    pub label: String,
    /// Whether clients should offer this relation prominently.
    #[serde(default)]
    pub relevant: bool,
}

/// An evidence type, usable as the class of evidence individuals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default)]
    pub classes: Vec<ClassEntry>,
    #[serde(default)]
    pub relations: Vec<RelationEntry>,
    #[serde(default)]
    pub evidence: Vec<EvidenceEntry>,
}

impl Vocabulary {
    /// The default vocabulary: the GO roots and a few descendants, common
    /// BFO/RO relations and ECO evidence types.
    pub fn builtin() -> Self {
        let class = |id: &str, label: &str, parents: &[&str], disjoint: &[&str]| ClassEntry {
            id: id.into(),
            label: label.into(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            disjoint_with: disjoint.iter().map(|d| d.to_string()).collect(),
        };
        let relation = |id: &str, label: &str, relevant: bool| RelationEntry {
            id: id.into(),
            label: label.into(),
            relevant,
        };
        let evidence = |id: &str, label: &str| EvidenceEntry {
            id: id.into(),
            label: label.into(),
        };

        Self {
            classes: vec![
                class(
                    "GO:0003674",
                    "molecular_function",
                    &[],
                    &["GO:0008150", "GO:0005575"],
                ),
                class("GO:0008150", "biological_process", &[], &["GO:0005575"]),
                class("GO:0005575", "cellular_component", &[], &[]),
                class("GO:0004672", "protein kinase activity", &["GO:0003674"], &[]),
                class("GO:0005515", "protein binding", &["GO:0003674"], &[]),
                class("GO:0006915", "apoptotic process", &["GO:0008150"], &[]),
                class("GO:0008104", "protein localization", &["GO:0008150"], &[]),
                class(
                    "GO:0048856",
                    "anatomical structure development",
                    &["GO:0008150"],
                    &[],
                ),
                class(
                    "GO:0009653",
                    "anatomical structure morphogenesis",
                    &["GO:0048856"],
                    &[],
                ),
                class("GO:0005634", "nucleus", &["GO:0005575"], &[]),
                class("GO:0005737", "cytoplasm", &["GO:0005575"], &[]),
            ],
            relations: vec![
                relation("BFO:0000050", "part of", true),
                relation("BFO:0000051", "has part", false),
                relation("BFO:0000066", "occurs in", true),
                relation("RO:0002333", "enabled by", true),
                relation("RO:0002411", "causally upstream of", true),
                relation("RO:0002213", "positively regulates", true),
                relation("RO:0002212", "negatively regulates", true),
                relation("RO:0002233", "has input", false),
                relation("RO:0002234", "has output", false),
            ],
            evidence: vec![
                evidence("ECO:0000000", "evidence"),
                evidence("ECO:0000001", "inference from background scientific knowledge"),
                evidence("ECO:0000002", "direct assay evidence"),
                evidence("ECO:0000314", "direct assay evidence used in manual assertion"),
                evidence(
                    "ECO:0000353",
                    "physical interaction evidence used in manual assertion",
                ),
            ],
        }
    }

    pub fn class(&self, id: &str) -> Option<&ClassEntry> {
        self.classes.iter().find(|c| c.id == id)
    }

    pub fn relation(&self, id: &str) -> Option<&RelationEntry> {
        self.relations.iter().find(|r| r.id == id)
    }

    /// Whether `id` names a known class or evidence type.
    pub fn has_class(&self, id: &str) -> bool {
        self.class(id).is_some() || self.evidence.iter().any(|e| e.id == id)
    }

    /// Label of any class, relation or evidence type.
    pub fn label(&self, id: &str) -> Option<&str> {
        self.class(id)
            .map(|c| c.label.as_str())
            .or_else(|| self.relation(id).map(|r| r.label.as_str()))
            .or_else(|| {
                self.evidence
                    .iter()
                    .find(|e| e.id == id)
                    .map(|e| e.label.as_str())
            })
    }

    /// `id` together with all of its transitive superclasses.
    pub fn ancestors(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([id.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(entry) = self.class(&current) {
                queue.extend(entry.parents.iter().cloned());
            }
        }
        seen
    }

    /// Whether any superclass of `a` is declared disjoint with any
    /// superclass of `b`, in either direction.
    pub fn are_disjoint(&self, a: &str, b: &str) -> bool {
        let left = self.ancestors(a);
        let right = self.ancestors(b);
        let declared = |from: &BTreeSet<String>, to: &BTreeSet<String>| {
            from.iter().any(|c| {
                self.class(c)
                    .is_some_and(|entry| entry.disjoint_with.iter().any(|d| to.contains(d)))
            })
        };
        declared(&left, &right) || declared(&right, &left)
    }
}
