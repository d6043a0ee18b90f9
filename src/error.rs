//! Rich diagnostic error types for the m3 batch engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. The batch response layer
//! additionally needs a coarse classification of every failure, exposed through
//! [`M3Error::class`].

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the m3 engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum M3Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Coarse failure classification reported back to batch clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A required argument was absent or had no valid value.
    MissingParameter,
    /// A model, individual, class or variable reference could not be resolved.
    UnknownIdentifier,
    /// An unprivileged caller attempted a privileged operation.
    InsufficientPermission,
    /// A batch referenced more than one model id.
    MultipleModelIds,
    /// Pre-save checks failed.
    ValidationFailed,
    /// Undo or redo was requested with an empty stack.
    EmptyHistory,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::MissingParameter => "MissingParameter",
            ErrorClass::UnknownIdentifier => "UnknownIdentifier",
            ErrorClass::InsufficientPermission => "InsufficientPermission",
            ErrorClass::MultipleModelIds => "MultipleModelIds",
            ErrorClass::ValidationFailed => "ValidationFailed",
            ErrorClass::EmptyHistory => "EmptyHistory",
            ErrorClass::Internal => "Internal",
        };
        f.write_str(name)
    }
}

impl M3Error {
    /// Classification of this error for the batch response.
    pub fn class(&self) -> ErrorClass {
        match self {
            M3Error::Batch(e) => e.class(),
            M3Error::Store(e) => e.class(),
            M3Error::Expression(e) => e.class(),
            M3Error::Config(_) => ErrorClass::Internal,
        }
    }

    /// Whether the error message is shown to clients as-is, without the
    /// generic batch-failure prefix.
    pub fn is_plain(&self) -> bool {
        matches!(
            self,
            M3Error::Batch(
                BatchError::EmptyBatch
                    | BatchError::InsufficientPermission { .. }
                    | BatchError::MetaConflict { .. }
                    | BatchError::UnsupportedOperation { .. }
                    | BatchError::ValidationFailed { .. }
            )
        )
    }

    /// Validation issues, if this is a failed pre-save validation.
    pub fn validation_issues(&self) -> Option<&[String]> {
        match self {
            M3Error::Batch(BatchError::ValidationFailed { issues }) => Some(issues),
            _ => None,
        }
    }
}

/// Result alias used throughout the engine.
pub type M3Result<T> = std::result::Result<T, M3Error>;

// ---------------------------------------------------------------------------
// Batch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BatchError {
    #[error("Empty batch calls are not supported, at least one request is required.")]
    #[diagnostic(
        code(m3::batch::empty),
        help("Submit at least one request in the `requests` list.")
    )]
    EmptyBatch,

    #[error("Expected non-null value for: request.arguments.{name}")]
    #[diagnostic(
        code(m3::batch::missing_parameter),
        help("Add the `{name}` argument to the request.")
    )]
    MissingParameter { name: String },

    #[error("No valid value for entity type: {token}")]
    #[diagnostic(
        code(m3::batch::unknown_entity),
        help("Valid entities are: individual, edge, model, relations, evidence.")
    )]
    UnknownEntity { token: String },

    #[error("No valid value for operation type: {token}")]
    #[diagnostic(
        code(m3::batch::unknown_operation),
        help("Operation tokens are hyphenated, e.g. `add-type` or `get-undo-redo`.")
    )]
    UnknownOperation { token: String },

    #[error("Unknown operation: {operation} for entity: {entity}")]
    #[diagnostic(
        code(m3::batch::unsupported_operation),
        help("This entity does not offer the requested operation.")
    )]
    UnsupportedOperation { entity: String, operation: String },

    #[error("Insufficient permissions for the operation {operation} on entity: {entity}")]
    #[diagnostic(
        code(m3::batch::insufficient_permission),
        help("Only read and export operations are available without privileges.")
    )]
    InsufficientPermission { entity: String, operation: String },

    #[error("Using multiple modelIds in one batch call is not supported.")]
    #[diagnostic(
        code(m3::batch::multiple_model_ids),
        help("Split the batch into one call per model.")
    )]
    MultipleModelIds { first: String, second: String },

    #[error("{operation} can only be combined with other meta operations.")]
    #[diagnostic(
        code(m3::batch::meta_conflict),
        help("Send metadata requests in a separate batch from model edits.")
    )]
    MetaConflict { operation: String },

    #[error("Could not find an individual for id or variable: {token}")]
    #[diagnostic(
        code(m3::batch::unknown_reference),
        help("Use an existing individual id, or bind a variable with `assignToVariable` first.")
    )]
    UnknownReference { token: String },

    #[error("Save model failed due to a failed validation of the model")]
    #[diagnostic(
        code(m3::batch::validation_failed),
        help("Fix the reported issues, or disable `validate_before_save`.")
    )]
    ValidationFailed { issues: Vec<String> },

    #[error("Unsupported export format: {format}")]
    #[diagnostic(
        code(m3::batch::unsupported_format),
        help("Legacy export supports `gaf` and `gpad`.")
    )]
    UnsupportedFormat { format: String },

    #[error("Nothing to undo for model: {model}")]
    #[diagnostic(
        code(m3::batch::nothing_to_undo),
        help("The undo stack for this model is empty.")
    )]
    NothingToUndo { model: String },

    #[error("Nothing to redo for model: {model}")]
    #[diagnostic(
        code(m3::batch::nothing_to_redo),
        help("The redo stack is cleared by every new edit after an undo.")
    )]
    NothingToRedo { model: String },

    #[error("Could not parse the model to import: {message}")]
    #[diagnostic(
        code(m3::batch::import_parse),
        help("`importModel` must be a document produced by the `export` operation.")
    )]
    ImportParse { message: String },
}

impl BatchError {
    fn class(&self) -> ErrorClass {
        match self {
            BatchError::MissingParameter { .. }
            | BatchError::UnknownEntity { .. }
            | BatchError::UnknownOperation { .. }
            | BatchError::UnsupportedFormat { .. }
            | BatchError::EmptyBatch => ErrorClass::MissingParameter,
            BatchError::UnknownReference { .. } => ErrorClass::UnknownIdentifier,
            BatchError::InsufficientPermission { .. } => ErrorClass::InsufficientPermission,
            BatchError::MultipleModelIds { .. } => ErrorClass::MultipleModelIds,
            BatchError::ValidationFailed { .. } => ErrorClass::ValidationFailed,
            BatchError::NothingToUndo { .. } | BatchError::NothingToRedo { .. } => {
                ErrorClass::EmptyHistory
            }
            BatchError::UnsupportedOperation { .. }
            | BatchError::MetaConflict { .. }
            | BatchError::ImportParse { .. } => ErrorClass::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("Could not find a model for id: {model}")]
    #[diagnostic(
        code(m3::store::model_not_found),
        help("List known models with `all-model-ids`, or create one with `model/add`.")
    )]
    ModelNotFound { model: String },

    #[error("Could not find individual {individual} in model {model}")]
    #[diagnostic(
        code(m3::store::individual_not_found),
        help("The individual may have been deleted by an earlier request.")
    )]
    IndividualNotFound { model: String, individual: String },

    #[error("Could not find fact {subject} {predicate} {object} in model {model}")]
    #[diagnostic(
        code(m3::store::fact_not_found),
        help("Check subject, predicate and object of the edge.")
    )]
    FactNotFound {
        model: String,
        subject: String,
        predicate: String,
        object: String,
    },

    #[error("A model with id {model} is already loaded")]
    #[diagnostic(
        code(m3::store::model_exists),
        help("Import under a fresh id, or edit the loaded model directly.")
    )]
    ModelExists { model: String },

    #[error("Model persistence is not configured")]
    #[diagnostic(
        code(m3::store::no_data_dir),
        help("Set `data_dir` in the engine configuration to enable `store`.")
    )]
    NoDataDir,

    #[error("I/O error at {path}: {source}")]
    #[diagnostic(
        code(m3::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(m3::store::serialization),
        help("A stored model document could not be read or written as JSON.")
    )]
    Serialization { message: String },
}

impl StoreError {
    fn class(&self) -> ErrorClass {
        match self {
            StoreError::ModelNotFound { .. }
            | StoreError::IndividualNotFound { .. }
            | StoreError::FactNotFound { .. } => ErrorClass::UnknownIdentifier,
            _ => ErrorClass::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// Expression errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExpressionError {
    #[error("Missing expressions: empty expression list is not allowed.")]
    #[diagnostic(
        code(m3::expression::empty),
        help("Supply at least one class expression.")
    )]
    Empty,

    #[error("Missing field in class expression: {field}")]
    #[diagnostic(
        code(m3::expression::missing_field),
        help("`class` needs `literal`; `svf` needs `onProp` and a `literal` or `expressions`.")
    )]
    MissingField { field: &'static str },

    #[error("Unknown class expression type: {kind}")]
    #[diagnostic(
        code(m3::expression::unknown_type),
        help("Valid types are: class, svf, intersection, union.")
    )]
    UnknownType { kind: String },

    #[error("Could not retrieve a class for id: {id}")]
    #[diagnostic(
        code(m3::expression::unknown_class),
        help("The class is not part of the configured vocabulary.")
    )]
    UnknownClass { id: String },
}

impl ExpressionError {
    fn class(&self) -> ErrorClass {
        match self {
            ExpressionError::UnknownClass { .. } => ErrorClass::UnknownIdentifier,
            _ => ErrorClass::MissingParameter,
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read engine config: {path}")]
    #[diagnostic(
        code(m3::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse engine config: {path}: {message}")]
    #[diagnostic(
        code(m3::config::parse),
        help("Check the TOML syntax in the engine config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write engine config: {path}")]
    #[diagnostic(
        code(m3::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
