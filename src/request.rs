//! Wire types for inbound batch requests.
//!
//! Entity and operation arrive as string tokens and are parsed into the
//! closed [`EntityKind`] and [`Operation`] enums before dispatch. Operation
//! tokens are hyphenated (`add-type`); the camelCase spellings used by older
//! clients (`addType`, `exportModel`) are accepted as aliases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BatchError;
use crate::model::ExpressionArgument;

/// One key/value pair in `arguments.values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueArgument {
    pub key: String,
    pub value: String,
}

impl ValueArgument {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Arguments of a single request. Which fields are required depends on the
/// entity and operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arguments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expressions: Option<Vec<ExpressionArgument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ValueArgument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_to_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon_id: Option<String>,
}

/// A single request as sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub entity: String,
    pub operation: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl Request {
    pub fn new(entity: impl Into<String>, operation: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            entity: entity.into(),
            operation: operation.into(),
            arguments,
        }
    }
}

/// A whole batch call: requests plus caller metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub intention: Option<String>,
    #[serde(default)]
    pub packet_id: Option<String>,
    #[serde(default)]
    pub requests: Vec<Request>,
}

// ---------------------------------------------------------------------------
// Entity and operation tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Individual,
    Edge,
    Model,
    Relations,
    Evidence,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Individual => "individual",
            EntityKind::Edge => "edge",
            EntityKind::Model => "model",
            EntityKind::Relations => "relations",
            EntityKind::Evidence => "evidence",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "individual" => Ok(EntityKind::Individual),
            "edge" => Ok(EntityKind::Edge),
            "model" => Ok(EntityKind::Model),
            "relations" => Ok(EntityKind::Relations),
            "evidence" => Ok(EntityKind::Evidence),
            other => Err(BatchError::UnknownEntity {
                token: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Add,
    Remove,
    AddType,
    RemoveType,
    AddAnnotation,
    RemoveAnnotation,
    Export,
    ExportLegacy,
    Import,
    Store,
    Undo,
    Redo,
    GetUndoRedo,
    AllModelIds,
    AllModelMeta,
    UpdateImports,
}

impl Operation {
    pub const ALL: [Operation; 17] = [
        Operation::Get,
        Operation::Add,
        Operation::Remove,
        Operation::AddType,
        Operation::RemoveType,
        Operation::AddAnnotation,
        Operation::RemoveAnnotation,
        Operation::Export,
        Operation::ExportLegacy,
        Operation::Import,
        Operation::Store,
        Operation::Undo,
        Operation::Redo,
        Operation::GetUndoRedo,
        Operation::AllModelIds,
        Operation::AllModelMeta,
        Operation::UpdateImports,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Add => "add",
            Operation::Remove => "remove",
            Operation::AddType => "add-type",
            Operation::RemoveType => "remove-type",
            Operation::AddAnnotation => "add-annotation",
            Operation::RemoveAnnotation => "remove-annotation",
            Operation::Export => "export",
            Operation::ExportLegacy => "export-legacy",
            Operation::Import => "import",
            Operation::Store => "store",
            Operation::Undo => "undo",
            Operation::Redo => "redo",
            Operation::GetUndoRedo => "get-undo-redo",
            Operation::AllModelIds => "all-model-ids",
            Operation::AllModelMeta => "all-model-meta",
            Operation::UpdateImports => "update-imports",
        }
    }

    fn alias(self) -> Option<&'static str> {
        match self {
            Operation::AddType => Some("addType"),
            Operation::RemoveType => Some("removeType"),
            Operation::AddAnnotation => Some("addAnnotation"),
            Operation::RemoveAnnotation => Some("removeAnnotation"),
            Operation::Export => Some("exportModel"),
            Operation::ExportLegacy => Some("exportModelLegacy"),
            Operation::Import => Some("importModel"),
            Operation::Store => Some("storeModel"),
            Operation::GetUndoRedo => Some("getUndoRedo"),
            Operation::AllModelIds => Some("allModelIds"),
            Operation::AllModelMeta => Some("allModelMeta"),
            Operation::UpdateImports => Some("updateImports"),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Operation {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Operation::ALL
            .into_iter()
            .find(|op| op.label() == s || op.alias() == Some(s))
            .ok_or_else(|| BatchError::UnknownOperation {
                token: s.to_string(),
            })
    }
}
