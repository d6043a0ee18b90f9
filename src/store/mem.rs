//! In-memory model store backed by DashMap.
//!
//! Each model sits behind its own `RwLock`, so batches against different
//! models never contend. With a data directory configured, `save_model`
//! writes JSON documents under `<data_dir>/models/` and models not yet in
//! memory are loaded lazily on first access.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use super::{EditPlan, ModelStore, StoreResult};
use crate::error::StoreError;
use crate::ids::{IdAllocator, IndividualId, ModelId};
use crate::model::{Change, Model, ModelDocument};

/// Concurrent in-memory store using a sharded hashmap.
#[derive(Debug)]
pub struct MemModelStore {
    models: DashMap<ModelId, Arc<RwLock<Model>>>,
    ids: IdAllocator,
    models_dir: Option<PathBuf>,
}

impl MemModelStore {
    /// Create an empty, memory-only store.
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
            ids: IdAllocator::new(),
            models_dir: None,
        }
    }

    /// Create a store that persists models under `data_dir/models`.
    pub fn with_persistence(data_dir: &Path) -> StoreResult<Self> {
        let models_dir = data_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| StoreError::Io {
            path: models_dir.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            models: DashMap::new(),
            ids: IdAllocator::new(),
            models_dir: Some(models_dir),
        })
    }

    /// Number of models currently held in memory.
    pub fn loaded_count(&self) -> usize {
        self.models.len()
    }

    fn file_for(&self, model: &ModelId) -> Option<PathBuf> {
        self.models_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", file_stem(model))))
    }

    fn handle(&self, model: &ModelId) -> StoreResult<Arc<RwLock<Model>>> {
        if let Some(entry) = self.models.get(model) {
            return Ok(Arc::clone(entry.value()));
        }
        let loaded = self.load(model)?;
        let entry = self
            .models
            .entry(model.clone())
            .or_insert_with(|| Arc::new(RwLock::new(loaded)));
        Ok(Arc::clone(entry.value()))
    }

    /// The stored document for `model`, if its file exists and carries that id.
    fn stored_document(&self, model: &ModelId) -> StoreResult<Option<ModelDocument>> {
        let Some(path) = self.file_for(model).filter(|p| p.exists()) else {
            return Ok(None);
        };
        let document = read_document(&path)?;
        if &document.id != model {
            tracing::warn!(
                model = %model,
                path = %path.display(),
                stored = %document.id,
                "model file holds another id"
            );
            return Ok(None);
        }
        tracing::debug!(model = %model, path = %path.display(), "read stored model");
        Ok(Some(document))
    }

    fn load(&self, model: &ModelId) -> StoreResult<Model> {
        self.stored_document(model)?
            .map(Model::from_document)
            .ok_or_else(|| StoreError::ModelNotFound {
                model: model.to_string(),
            })
    }

    fn stored_ids(&self) -> StoreResult<Vec<ModelId>> {
        let Some(dir) = &self.models_dir else {
            return Ok(Vec::new());
        };
        let entries = std::fs::read_dir(dir).map_err(|e| StoreError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let mut ids = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_document(&path) {
                Ok(doc) => ids.push(doc.id),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable model file"),
            }
        }
        Ok(ids)
    }
}

impl Default for MemModelStore {
    fn default() -> Self {
        Self::new()
    }
}

/// File stem for a model id: ASCII letters, digits and '-' are kept, every
/// other byte becomes `_xx` in lowercase hex. '_' itself is escaped, so
/// distinct ids always map to distinct files.
fn file_stem(model: &ModelId) -> String {
    let mut stem = String::with_capacity(model.as_str().len());
    for byte in model.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{byte:02x}"));
        }
    }
    stem
}

fn read_document(path: &Path) -> StoreResult<ModelDocument> {
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| StoreError::Serialization {
        message: format!("{}: {e}", path.display()),
    })
}

impl ModelStore for MemModelStore {
    fn generate_blank_model(&self) -> StoreResult<ModelId> {
        // A restarted process may reissue ids of models stored in the same second.
        let mut id = self.ids.model_id();
        while self.contains_model(&id) {
            id = self.ids.model_id();
        }
        self.models
            .insert(id.clone(), Arc::new(RwLock::new(Model::new(id.clone()))));
        tracing::info!(model = %id, "generated blank model");
        Ok(id)
    }

    fn import_model(&self, document: ModelDocument) -> StoreResult<ModelId> {
        let id = document.id.clone();
        if self.contains_model(&id) {
            return Err(StoreError::ModelExists {
                model: id.to_string(),
            });
        }
        let model = Model::from_document(document);
        tracing::info!(model = %id, individuals = model.individual_count(), "imported model");
        self.models.insert(id.clone(), Arc::new(RwLock::new(model)));
        Ok(id)
    }

    fn contains_model(&self, model: &ModelId) -> bool {
        if self.models.contains_key(model) {
            return true;
        }
        match self.stored_document(model) {
            Ok(document) => document.is_some(),
            // An unreadable file still occupies the id's path.
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "unreadable stored model");
                true
            }
        }
    }

    fn model_ids(&self) -> StoreResult<Vec<ModelId>> {
        let mut ids: Vec<ModelId> = self.models.iter().map(|e| e.key().clone()).collect();
        ids.extend(self.stored_ids()?);
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn snapshot(&self, model: &ModelId) -> StoreResult<Model> {
        let handle = self.handle(model)?;
        let guard = handle.read().expect("model lock poisoned");
        Ok(guard.clone())
    }

    fn contains_individual(&self, model: &ModelId, individual: &IndividualId) -> StoreResult<bool> {
        let handle = self.handle(model)?;
        let guard = handle.read().expect("model lock poisoned");
        Ok(guard.contains_individual(individual))
    }

    fn fresh_individual_id(&self, model: &ModelId) -> IndividualId {
        let taken = |id: &IndividualId| {
            self.models.get(model).is_some_and(|entry| {
                entry
                    .value()
                    .read()
                    .expect("model lock poisoned")
                    .contains_individual(id)
            })
        };
        let mut id = self.ids.individual_id(model);
        while taken(&id) {
            id = self.ids.individual_id(model);
        }
        id
    }

    fn update(&self, model: &ModelId, plan: &mut EditPlan<'_>) -> StoreResult<Vec<Change>> {
        let handle = self.handle(model)?;
        let mut guard = handle.write().expect("model lock poisoned");
        let planned = plan(&guard)?;
        Ok(planned.into_iter().filter(|c| guard.apply(c)).collect())
    }

    fn save_model(&self, model: &ModelId) -> StoreResult<()> {
        let path = self.file_for(model).ok_or(StoreError::NoDataDir)?;
        let document = self.snapshot(model)?.document();
        let content =
            serde_json::to_string_pretty(&document).map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;
        std::fs::write(&path, content).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        tracing::info!(model = %model, path = %path.display(), "saved model");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotation, AnnotationTarget, ClassExpression, FactKey};

    fn store_with_model() -> (MemModelStore, ModelId) {
        let store = MemModelStore::new();
        let id = store.generate_blank_model().unwrap();
        (store, id)
    }

    #[test]
    fn create_and_snapshot() {
        let (store, model) = store_with_model();
        let (ind, changes) = store
            .create_individual(
                &model,
                &[
                    ClassExpression::class("GO:0003674"),
                    ClassExpression::class("GO:0004672"),
                ],
                &[Annotation::literal("comment", "x")],
            )
            .unwrap();
        assert_eq!(changes.len(), 4);
        let snap = store.snapshot(&model).unwrap();
        assert!(snap.contains_individual(&ind));
        assert_eq!(snap.types_of(&ind).count(), 2);
    }

    #[test]
    fn unknown_model_is_reported() {
        let store = MemModelStore::new();
        let err = store.snapshot(&ModelId::from("gomodel:missing")).unwrap_err();
        assert!(matches!(err, StoreError::ModelNotFound { .. }));
    }

    #[test]
    fn fact_requires_existing_endpoints() {
        let (store, model) = store_with_model();
        let (a, _) = store
            .create_individual(&model, &[ClassExpression::class("GO:0003674")], &[])
            .unwrap();
        let fact = FactKey::new(a, "BFO:0000050", IndividualId::from("nope"));
        let err = store.add_fact(&model, &fact, &[]).unwrap_err();
        assert!(matches!(err, StoreError::IndividualNotFound { .. }));
    }

    #[test]
    fn undo_restores_previous_state() {
        let (store, model) = store_with_model();
        let before = store.snapshot(&model).unwrap();
        let changes = store
            .add_annotations(
                &model,
                &AnnotationTarget::Model,
                &[Annotation::literal("title", "t")],
            )
            .unwrap();
        store.undo(&model, &changes).unwrap();
        assert_eq!(store.snapshot(&model).unwrap(), before);
        store.redo(&model, &changes).unwrap();
        assert_eq!(store.snapshot(&model).unwrap().annotations().len(), 1);
    }

    #[test]
    fn save_requires_data_dir() {
        let (store, model) = store_with_model();
        assert!(matches!(store.save_model(&model), Err(StoreError::NoDataDir)));
    }

    #[test]
    fn saved_models_load_lazily() {
        let dir = tempfile::TempDir::new().unwrap();
        let model = {
            let store = MemModelStore::with_persistence(dir.path()).unwrap();
            let model = store.generate_blank_model().unwrap();
            store
                .create_individual(&model, &[ClassExpression::class("GO:0008150")], &[])
                .unwrap();
            store.save_model(&model).unwrap();
            model
        };

        let store = MemModelStore::with_persistence(dir.path()).unwrap();
        assert_eq!(store.loaded_count(), 0);
        assert_eq!(store.model_ids().unwrap(), vec![model.clone()]);
        assert_eq!(store.snapshot(&model).unwrap().individual_count(), 1);
        assert_eq!(store.loaded_count(), 1);
    }

    #[test]
    fn import_rejects_existing_id() {
        let (store, model) = store_with_model();
        let doc = store.snapshot(&model).unwrap().document();
        assert!(matches!(store.import_model(doc), Err(StoreError::ModelExists { .. })));
    }

    #[test]
    fn file_stems_keep_distinct_ids_apart() {
        let colon = file_stem(&ModelId::from("gomodel:p1"));
        let underscore = file_stem(&ModelId::from("gomodel_p1"));
        assert_eq!(colon, "gomodel_3ap1");
        assert_eq!(underscore, "gomodel_5fp1");
        assert_eq!(file_stem(&ModelId::from("gomodel-5a")), "gomodel-5a");
    }

    #[test]
    fn stored_file_of_another_id_does_not_count() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = MemModelStore::with_persistence(dir.path()).unwrap();
        let stored = ModelId::from("gomodel:p1");
        store
            .import_model(Model::new(stored.clone()).document())
            .unwrap();
        store.save_model(&stored).unwrap();

        // Put the document where another id's file would live.
        let other = ModelId::from("gomodel:p2");
        std::fs::copy(
            store.file_for(&stored).unwrap(),
            store.file_for(&other).unwrap(),
        )
        .unwrap();

        let fresh = MemModelStore::with_persistence(dir.path()).unwrap();
        assert!(fresh.contains_model(&stored));
        assert!(!fresh.contains_model(&other));
        assert!(matches!(
            fresh.snapshot(&other),
            Err(StoreError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn concurrent_edits_on_distinct_models() {
        let store = Arc::new(MemModelStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let model = store.generate_blank_model().unwrap();
                    for _ in 0..10 {
                        store
                            .create_individual(&model, &[ClassExpression::class("GO:0003674")], &[])
                            .unwrap();
                    }
                    model
                })
            })
            .collect();
        for h in handles {
            let model = h.join().unwrap();
            assert_eq!(store.snapshot(&model).unwrap().individual_count(), 10);
        }
    }
}
