//! Batch responses: wire types, assembly from a finished batch, and error
//! composition.
//!
//! A finished batch is turned into a `meta`, `rebuild` or `merge` response
//! by [`assemble`]. Failures become `messageType = error` responses through
//! [`BatchResponse::failure`], which decides how much of the error the
//! client gets to see.

use std::collections::BTreeMap;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};

use crate::batch::{BatchContext, BatchOutcome, BatchState};
use crate::error::M3Error;
use crate::render::{JsonAnnotation, JsonFact, JsonIndividual, JsonProperty};

pub const SUCCESS_MESSAGE: &str = "success";
pub const BATCH_FAILURE_MESSAGE: &str = "Could not successfully complete batch request.";
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occured at the server level.";

/// How the client should reconcile its local copy of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Replace the rendered individuals and facts.
    Merge,
    /// Discard local state and re-render the whole model.
    Rebuild,
    /// Nothing model-related; only the meta payload is set.
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationJson {
    pub id: String,
    pub label: String,
    pub relevant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceJson {
    pub id: String,
    pub label: String,
}

/// One undo or redo stack entry; `time` is milliseconds since the edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryJson {
    #[serde(rename = "user-id")]
    pub user_id: Option<String>,
    pub time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<Vec<RelationJson>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<EvidenceJson>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models_meta: Option<BTreeMap<String, BTreeMap<String, Vec<String>>>>,
}

impl MetaData {
    pub fn is_empty(&self) -> bool {
        self.relations.is_none()
            && self.evidence.is_none()
            && self.model_ids.is_none()
            && self.models_meta.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inconsistent_flag: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<JsonAnnotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facts: Option<Vec<JsonFact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individuals: Option<Vec<JsonIndividual>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individuals_inferred: Option<Vec<JsonIndividual>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<JsonProperty>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo: Option<Vec<HistoryJson>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redo: Option<Vec<HistoryJson>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaData>,
}

/// Correlation fields echoed back on every response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeader {
    pub packet_id: String,
    pub uid: Option<String>,
    pub intention: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub packet_id: String,
    pub uid: Option<String>,
    pub intention: Option<String>,
    /// Absent on error responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    pub message_type: MessageType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentary: Option<String>,
    #[serde(default)]
    pub data: ResponseData,
}

impl BatchResponse {
    pub fn success(header: ResponseHeader, signal: Signal, data: ResponseData) -> Self {
        Self {
            packet_id: header.packet_id,
            uid: header.uid,
            intention: header.intention,
            signal: Some(signal),
            message_type: MessageType::Success,
            message: SUCCESS_MESSAGE.to_string(),
            commentary: None,
            data,
        }
    }

    /// An error response for a handler or dispatch failure.
    ///
    /// Plain errors are shown as-is. Validation failures carry their issues,
    /// one per line, as commentary. Everything else is prefixed with the
    /// generic failure message and its classification, and carries the
    /// diagnostic chain as commentary.
    pub fn failure(header: ResponseHeader, err: &M3Error) -> Self {
        let (message, commentary) = if let Some(issues) = err.validation_issues() {
            (err.to_string(), Some(issues.join("\n")))
        } else if err.is_plain() {
            (err.to_string(), None)
        } else {
            (
                format!("{BATCH_FAILURE_MESSAGE} Exception: {}. {err}", err.class()),
                diagnostic_chain(err),
            )
        };
        Self::error(header, message, commentary)
    }

    /// An error response that reveals nothing about the failure.
    pub fn internal_error(header: ResponseHeader) -> Self {
        Self::error(header, INTERNAL_ERROR_MESSAGE.to_string(), None)
    }

    fn error(header: ResponseHeader, message: String, commentary: Option<String>) -> Self {
        Self {
            packet_id: header.packet_id,
            uid: header.uid,
            intention: header.intention,
            signal: None,
            message_type: MessageType::Error,
            message,
            commentary,
            data: ResponseData::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.message_type == MessageType::Success
    }
}

/// Diagnostic code, source chain and help text, one per line.
fn diagnostic_chain(err: &M3Error) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(code) = err.code() {
        lines.push(format!("code: {code}"));
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    if let Some(help) = err.help() {
        lines.push(format!("help: {help}"));
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Build the signal and data of a successful batch.
pub fn assemble(ctx: &BatchContext<'_>, outcome: BatchOutcome) -> (Signal, ResponseData) {
    match outcome {
        BatchOutcome::Meta(state) => (Signal::Meta, meta_data(state)),
        BatchOutcome::Model {
            state,
            model,
            consistent,
        } => {
            let bulk = state.render_bulk;
            let graph = if bulk {
                ctx.renderer.render_model(&model)
            } else {
                ctx.renderer
                    .render_individuals(&model, &state.relevant_individuals)
            };
            let inferred = ctx.config.add_inferences.then(|| {
                let only = (!bulk).then_some(&state.relevant_individuals);
                ctx.renderer
                    .render_model_inferences(&model, ctx.reasoner, only)
            });
            let annotations = (bulk || state.render_model_annotations)
                .then(|| ctx.renderer.render_model_annotations(&model));

            let data = ResponseData {
                id: Some(model.id().to_string()),
                inconsistent_flag: (!consistent).then_some(true),
                annotations,
                facts: Some(graph.facts),
                individuals: Some(graph.individuals),
                individuals_inferred: inferred,
                properties: Some(graph.properties),
                ..Default::default()
            };
            let signal = if bulk { Signal::Rebuild } else { Signal::Merge };
            (signal, data)
        }
    }
}

fn meta_data(state: BatchState) -> ResponseData {
    let meta = (!state.meta.is_empty()).then_some(state.meta);
    ResponseData {
        id: state.model_id.map(|m| m.to_string()),
        undo: state.undo,
        redo: state.redo,
        export_model: state.export_model,
        meta,
        ..Default::default()
    }
}
