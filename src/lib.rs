// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # m3-engine
//!
//! A batch edit engine for molecular models: graphs of typed individuals,
//! facts between them, and annotations. Clients send an ordered list of
//! requests; the engine resolves ids and batch variables, checks
//! permissions, edits one model, keeps its undo/redo history and answers
//! with a single response telling the client how to reconcile.
//!
//! ## Architecture
//!
//! - **Dispatch** (`batch`): `(entity, operation)` dispatch table, batch
//!   state, variable bindings and the operation handlers
//! - **Permissions** (`permission`): the unprivileged allow-list
//! - **History** (`ledger`): per-model undo/redo stacks of reversible changes
//! - **Responses** (`response`): signal selection, rendering, error messages
//! - **Collaborators**: `store` (models), `reasoner` (consistency and
//!   inferred types), `render` (JSON), `validate` (pre-save checks),
//!   `lookup` (labels)
//!
//! ## Library usage
//!
//! ```no_run
//! use m3_engine::config::EngineConfig;
//! use m3_engine::engine::BatchEngine;
//! use m3_engine::request::{Arguments, Request};
//!
//! let engine = BatchEngine::new(EngineConfig::default()).unwrap();
//! let requests = [Request::new(
//!     "model",
//!     "add",
//!     Arguments {
//!         taxon_id: Some("NCBITaxon:9606".into()),
//!         ..Default::default()
//!     },
//! )];
//! let response = engine.m3_batch(Some("orcid:0000-0002"), None, None, &requests, true);
//! println!("{}", serde_json::to_string_pretty(&response).unwrap());
//! ```

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod ids;
pub mod ledger;
pub mod lookup;
pub mod model;
pub mod permission;
pub mod reasoner;
pub mod render;
pub mod request;
pub mod response;
pub mod store;
pub mod validate;
pub mod vocabulary;
