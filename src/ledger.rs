//! Per-model undo/redo history.
//!
//! Every mutating request pushes one [`ChangeRecord`] onto its model's undo
//! stack and clears the redo stack. Undo pops a record, reverts it through
//! the [`ModelStore`] and moves it to the redo stack; redo does the reverse.
//! The model's history lock is held while the store applies the change, so
//! the ledger never disagrees with the model it describes. The map shard is
//! released first, so other models' histories stay available meanwhile.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::{BatchError, M3Result, StoreError};
use crate::ids::ModelId;
use crate::model::Change;
use crate::store::ModelStore;

/// One reversible edit and who made it when.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<Change>,
}

impl ChangeRecord {
    pub fn new(actor: Option<String>, changes: Vec<Change>) -> Self {
        Self {
            actor,
            timestamp: Utc::now(),
            changes,
        }
    }
}

/// Summary of a history entry, as reported by `get-undo-redo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub change_count: usize,
}

impl From<&ChangeRecord> for HistoryEntry {
    fn from(record: &ChangeRecord) -> Self {
        Self {
            actor: record.actor.clone(),
            timestamp: record.timestamp,
            change_count: record.changes.len(),
        }
    }
}

/// Undo and redo stacks, most recent entry first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    pub undo: Vec<HistoryEntry>,
    pub redo: Vec<HistoryEntry>,
}

#[derive(Debug, Default)]
struct Stacks {
    undo: Vec<ChangeRecord>,
    redo: Vec<ChangeRecord>,
}

#[derive(Debug, Default)]
pub struct UndoRedoLedger {
    stacks: DashMap<ModelId, Arc<Mutex<Stacks>>>,
}

impl UndoRedoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stacks of `model`, created on first use. The map guard is dropped
    /// before returning.
    fn stacks_of(&self, model: &ModelId) -> Arc<Mutex<Stacks>> {
        Arc::clone(self.stacks.entry(model.clone()).or_default().value())
    }

    /// Record an edit. Empty records are dropped.
    pub fn push(&self, model: &ModelId, record: ChangeRecord) {
        if record.changes.is_empty() {
            return;
        }
        let entry = self.stacks_of(model);
        let mut stacks = entry.lock().expect("ledger lock poisoned");
        stacks.undo.push(record);
        stacks.redo.clear();
    }

    /// Revert the most recent edit on `model`.
    pub fn undo(
        &self,
        store: &dyn ModelStore,
        model: &ModelId,
        actor: Option<&str>,
    ) -> M3Result<ChangeRecord> {
        require_model(store, model)?;
        let entry = self.stacks_of(model);
        let mut stacks = entry.lock().expect("ledger lock poisoned");
        let Some(mut record) = stacks.undo.pop() else {
            return Err(BatchError::NothingToUndo {
                model: model.to_string(),
            }
            .into());
        };
        if let Err(e) = store.undo(model, &record.changes) {
            stacks.undo.push(record);
            return Err(e.into());
        }
        record.actor = actor.map(str::to_string);
        record.timestamp = Utc::now();
        tracing::info!(model = %model, changes = record.changes.len(), "undo");
        stacks.redo.push(record.clone());
        Ok(record)
    }

    /// Re-apply the most recently undone edit on `model`.
    pub fn redo(
        &self,
        store: &dyn ModelStore,
        model: &ModelId,
        actor: Option<&str>,
    ) -> M3Result<ChangeRecord> {
        require_model(store, model)?;
        let entry = self.stacks_of(model);
        let mut stacks = entry.lock().expect("ledger lock poisoned");
        let Some(mut record) = stacks.redo.pop() else {
            return Err(BatchError::NothingToRedo {
                model: model.to_string(),
            }
            .into());
        };
        if let Err(e) = store.redo(model, &record.changes) {
            stacks.redo.push(record);
            return Err(e.into());
        }
        record.actor = actor.map(str::to_string);
        record.timestamp = Utc::now();
        tracing::info!(model = %model, changes = record.changes.len(), "redo");
        stacks.undo.push(record.clone());
        Ok(record)
    }

    /// Both stacks of `model`, most recent first.
    pub fn history(&self, model: &ModelId) -> History {
        let Some(entry) = self.stacks.get(model).map(|e| Arc::clone(e.value())) else {
            return History::default();
        };
        let stacks = entry.lock().expect("ledger lock poisoned");
        History {
            undo: stacks.undo.iter().rev().map(HistoryEntry::from).collect(),
            redo: stacks.redo.iter().rev().map(HistoryEntry::from).collect(),
        }
    }
}

fn require_model(store: &dyn ModelStore, model: &ModelId) -> M3Result<()> {
    if store.contains_model(model) {
        Ok(())
    } else {
        Err(StoreError::ModelNotFound {
            model: model.to_string(),
        }
        .into())
    }
}
