//! Handlers for `edge/*` requests.
//!
//! Every edge request names its fact by `subject`, `predicate` and
//! `object`; subject and object go through the variable bindings. Both
//! endpoints are rendered in a merge response.

use crate::batch::state::{required, required_values};
use crate::batch::{BatchContext, BatchState};
use crate::error::M3Result;
use crate::ids::ModelId;
use crate::model::{AnnotationTarget, FactKey};
use crate::request::Arguments;

fn fact(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<(ModelId, FactKey)> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let predicate = required(args.predicate.as_deref(), "predicate")?;
    let subject = state.resolve(ctx, &model, args.subject.as_deref(), "subject")?;
    let object = state.resolve(ctx, &model, args.object.as_deref(), "object")?;
    state.relevant_individuals.insert(subject.clone());
    state.relevant_individuals.insert(object.clone());
    Ok((model, FactKey::new(subject, predicate, object)))
}

pub fn add(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    let (model, fact) = fact(ctx, state, args)?;
    let mut annotations = state
        .variables
        .annotations(args.values.as_deref().unwrap_or_default());
    annotations.extend(ctx.generated_annotations(state.actor.as_deref(), true));

    let changes = ctx.store.add_fact(&model, &fact, &annotations)?;
    state.record(changes);
    ctx.stamp_model_contributor(state, &model)
}

pub fn remove(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    let (model, fact) = fact(ctx, state, args)?;
    let removal = ctx.store.remove_fact(&model, &fact)?;
    state.record(removal.changes);
    let swept = ctx.store.sweep_orphans(&model, &removal.orphan_candidates)?;
    state.record(swept);
    ctx.stamp_model_contributor(state, &model)
}

pub fn add_annotation(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    let (model, fact) = fact(ctx, state, args)?;
    let mut annotations = state.variables.annotations(required_values(args)?);
    annotations.extend(ctx.generated_annotations(state.actor.as_deref(), false));

    let changes = ctx
        .store
        .add_annotations(&model, &AnnotationTarget::Fact(fact), &annotations)?;
    state.record(changes);
    Ok(())
}

pub fn remove_annotation(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    let (model, fact) = fact(ctx, state, args)?;
    let annotations = state.variables.annotations(required_values(args)?);

    let removal = ctx
        .store
        .remove_annotations(&model, &AnnotationTarget::Fact(fact), &annotations)?;
    state.record(removal.changes);
    let swept = ctx.store.sweep_orphans(&model, &removal.orphan_candidates)?;
    state.record(swept);
    Ok(())
}
