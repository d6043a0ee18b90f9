//! Handlers for `model/*` requests.
//!
//! `export`, `export-legacy`, `store`, `get-undo-redo`, `all-model-ids` and
//! `all-model-meta` are meta requests: they fill the meta payload instead
//! of rendering the model, and cannot share a batch with edits.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use crate::batch::state::required_values;
use crate::batch::{BatchContext, BatchState};
use crate::error::{BatchError, M3Result};
use crate::export::{LegacyFormat, export_legacy as render_legacy};
use crate::ledger::HistoryEntry;
use crate::model::{Annotation, AnnotationShorthand, AnnotationTarget, Axiom, Change, ModelDocument};
use crate::request::Arguments;
use crate::response::HistoryJson;

pub fn get(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_non_meta()?;
    state.model(ctx, args)?;
    state.render_bulk = true;
    Ok(())
}

/// Create an empty model, seeded with the taxon and `values`.
pub fn add(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_non_meta()?;
    if let Some(current) = &state.model_id {
        return Err(BatchError::MultipleModelIds {
            first: current.to_string(),
            second: "a new model".into(),
        }
        .into());
    }
    let model = ctx.store.generate_blank_model()?;
    state.pin_model(model.clone())?;

    let mut annotations = Vec::new();
    if let Some(taxon) = args.taxon_id.as_deref().filter(|t| !t.is_empty()) {
        annotations.push(Annotation::shorthand(AnnotationShorthand::Taxon, taxon));
    }
    annotations.extend(
        state
            .variables
            .annotations(args.values.as_deref().unwrap_or_default()),
    );
    annotations.extend(ctx.generated_annotations(state.actor.as_deref(), true));
    let changes = ctx
        .store
        .add_annotations(&model, &AnnotationTarget::Model, &annotations)?;
    state.record(changes);

    state.render_bulk = true;
    Ok(())
}

pub fn add_annotation(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let annotations = state.variables.annotations(required_values(args)?);
    let changes = ctx
        .store
        .add_annotations(&model, &AnnotationTarget::Model, &annotations)?;
    state.record(changes);
    state.render_model_annotations = true;
    Ok(())
}

pub fn remove_annotation(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let annotations = state.variables.annotations(required_values(args)?);
    let removal = ctx
        .store
        .remove_annotations(&model, &AnnotationTarget::Model, &annotations)?;
    state.record(removal.changes);
    let swept = ctx.store.sweep_orphans(&model, &removal.orphan_candidates)?;
    state.record(swept);
    state.render_model_annotations = true;
    Ok(())
}

pub fn export(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_meta("Export model")?;
    let model = state.model(ctx, args)?;
    state.export_model = Some(ctx.store.export_model(&model)?);
    Ok(())
}

pub fn export_legacy(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    state.mark_meta("Export legacy model")?;
    let model = state.model(ctx, args)?;
    let format = match args.format.as_deref().filter(|f| !f.is_empty()) {
        Some(format) => format.parse::<LegacyFormat>()?,
        None => LegacyFormat::default(),
    };
    let snapshot = ctx.store.snapshot(&model)?;
    state.export_model = Some(render_legacy(
        &snapshot,
        format,
        &ctx.config.vocabulary,
        ctx.labels,
    ));
    Ok(())
}

/// Materialise a model from an exported document.
pub fn import(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_non_meta()?;
    let raw = args
        .import_model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| BatchError::MissingParameter {
            name: "importModel".into(),
        })?;
    let document: ModelDocument =
        serde_json::from_str(raw).map_err(|e| BatchError::ImportParse {
            message: e.to_string(),
        })?;
    state.pin_model(document.id.clone())?;
    let model = ctx.store.import_model(document)?;

    let mut annotations = state
        .variables
        .annotations(args.values.as_deref().unwrap_or_default());
    annotations.extend(ctx.generated_annotations(state.actor.as_deref(), false));
    let changes = ctx
        .store
        .add_annotations(&model, &AnnotationTarget::Model, &annotations)?;
    state.record(changes);

    state.render_bulk = true;
    Ok(())
}

/// Validate, then persist the model with the request's annotation values.
pub fn store(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_meta("Save model")?;
    let model = state.model(ctx, args)?;

    if ctx.config.validate_before_save {
        let issues = ctx.validator.validate(&ctx.store.snapshot(&model)?);
        if !issues.is_empty() {
            tracing::warn!(model = %model, issues = issues.len(), "model failed validation, not saved");
            return Err(BatchError::ValidationFailed { issues }.into());
        }
    }

    let annotations = state
        .variables
        .annotations(args.values.as_deref().unwrap_or_default());
    if !annotations.is_empty() {
        let changes = ctx
            .store
            .add_annotations(&model, &AnnotationTarget::Model, &annotations)?;
        state.record(changes);
    }
    ctx.store.save_model(&model)?;
    Ok(())
}

pub fn undo(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    ctx.ledger.undo(ctx.store, &model, state.actor.as_deref())?;
    state.render_bulk = true;
    Ok(())
}

pub fn redo(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    ctx.ledger.redo(ctx.store, &model, state.actor.as_deref())?;
    state.render_bulk = true;
    Ok(())
}

pub fn get_undo_redo(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    state.mark_meta("Get undo/redo history")?;
    let model = state.model(ctx, args)?;
    let history = ctx.ledger.history(&model);
    let now = Utc::now();
    let entries = |list: &[HistoryEntry]| {
        list.iter()
            .map(|e| HistoryJson {
                user_id: e.actor.clone(),
                time: (now - e.timestamp).num_milliseconds(),
            })
            .collect::<Vec<_>>()
    };
    state.undo = Some(entries(&history.undo));
    state.redo = Some(entries(&history.redo));
    Ok(())
}

pub fn all_model_ids(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    _args: &Arguments,
) -> M3Result<()> {
    state.mark_meta("Get all model ids")?;
    let ids = ctx.store.model_ids()?;
    state.meta.model_ids = Some(ids.iter().map(ToString::to_string).collect());
    Ok(())
}

/// Shorthand annotations of every model, keyed by model id.
pub fn all_model_meta(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    _args: &Arguments,
) -> M3Result<()> {
    state.mark_meta("Get all model meta")?;
    let mut all = BTreeMap::new();
    for id in ctx.store.model_ids()? {
        let snapshot = ctx.store.snapshot(&id)?;
        let mut meta: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for annotation in snapshot.annotations() {
            if let Some(shorthand) = annotation.shorthand_key() {
                meta.entry(shorthand.label().to_string())
                    .or_default()
                    .push(annotation.value.as_str().to_string());
            }
        }
        all.insert(id.to_string(), meta);
    }
    state.meta.models_meta = Some(all);
    Ok(())
}

/// Align the model's imports with the configured import list.
pub fn update_imports(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let wanted: BTreeSet<&String> = ctx.config.imports.iter().collect();
    let changes = ctx.store.update(&model, &mut |m| {
        let mut changes: Vec<Change> = m
            .imports()
            .iter()
            .filter(|iri| !wanted.contains(iri))
            .map(|iri| Change::Remove(Axiom::Import { iri: iri.clone() }))
            .collect();
        changes.extend(
            wanted
                .iter()
                .filter(|iri| !m.imports().contains(**iri))
                .map(|iri| Change::Add(Axiom::Import {
                    iri: (*iri).clone(),
                })),
        );
        Ok(changes)
    })?;
    tracing::info!(model = %model, changes = changes.len(), "updated imports");
    state.record(changes);
    state.render_bulk = true;
    Ok(())
}
