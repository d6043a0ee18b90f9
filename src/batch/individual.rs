//! Handlers for `individual/*` requests.

use crate::batch::state::required_values;
use crate::batch::{BatchContext, BatchState};
use crate::error::{BatchError, M3Result};
use crate::model::{AnnotationTarget, ClassExpression};
use crate::request::Arguments;

fn expressions(ctx: &BatchContext<'_>, args: &Arguments) -> M3Result<Vec<ClassExpression>> {
    let raw = args
        .expressions
        .as_deref()
        .ok_or_else(|| BatchError::MissingParameter {
            name: "expressions".into(),
        })?;
    Ok(ctx.parser().parse_all(raw)?)
}

pub fn get(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let individual = state.resolve(ctx, &model, args.individual.as_deref(), "individual")?;
    state
        .variables
        .bind_opt(args.assign_to_variable.as_deref(), &individual);
    state.relevant_individuals.insert(individual);
    Ok(())
}

/// Create an individual, or add types to the bound individual named by
/// `individual`.
pub fn add(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let expressions = expressions(ctx, args)?;
    let mut annotations = state
        .variables
        .annotations(args.values.as_deref().unwrap_or_default());
    annotations.extend(ctx.generated_annotations(state.actor.as_deref(), true));

    let existing = args
        .individual
        .as_deref()
        .and_then(|token| state.variables.get(token))
        .cloned();

    let individual = match existing {
        Some(individual) => {
            for expression in &expressions {
                let changes = ctx.store.add_type(&model, &individual, expression)?;
                state.record(changes);
            }
            let changes = ctx.store.add_annotations(
                &model,
                &AnnotationTarget::Individual(individual.clone()),
                &annotations,
            )?;
            state.record(changes);
            individual
        }
        None => {
            let (individual, changes) =
                ctx.store
                    .create_individual(&model, &expressions, &annotations)?;
            tracing::debug!(model = %model, individual = %individual, "created individual");
            state.record(changes);
            individual
        }
    };

    state
        .variables
        .bind_opt(args.assign_to_variable.as_deref(), &individual);
    state.relevant_individuals.insert(individual);
    ctx.stamp_model_contributor(state, &model)
}

/// Delete an individual with everything mentioning it, then sweep the
/// annotation-value individuals left without a referent.
pub fn remove(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let individual = state.resolve(ctx, &model, args.individual.as_deref(), "individual")?;

    let removal = ctx.store.delete_individual(&model, &individual)?;
    state.record(removal.changes);
    let swept = ctx.store.sweep_orphans(&model, &removal.orphan_candidates)?;
    if !swept.is_empty() {
        tracing::debug!(model = %model, changes = swept.len(), "swept orphaned annotation values");
    }
    state.record(swept);

    state.relevant_individuals.remove(&individual);
    state.render_bulk = true;
    ctx.stamp_model_contributor(state, &model)
}

pub fn add_type(ctx: &BatchContext<'_>, state: &mut BatchState, args: &Arguments) -> M3Result<()> {
    change_types(ctx, state, args, true)
}

pub fn remove_type(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    change_types(ctx, state, args, false)
}

fn change_types(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
    adding: bool,
) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let individual = state.resolve(ctx, &model, args.individual.as_deref(), "individual")?;
    let expressions = expressions(ctx, args)?;

    for expression in &expressions {
        let changes = if adding {
            ctx.store.add_type(&model, &individual, expression)?
        } else {
            ctx.store.remove_type(&model, &individual, expression)?
        };
        state.record(changes);
    }
    let stamp = ctx.generated_annotations(state.actor.as_deref(), true);
    if !stamp.is_empty() {
        let changes = ctx.store.add_annotations(
            &model,
            &AnnotationTarget::Individual(individual.clone()),
            &stamp,
        )?;
        state.record(changes);
    }

    state
        .variables
        .bind_opt(args.assign_to_variable.as_deref(), &individual);
    state.relevant_individuals.insert(individual);
    ctx.stamp_model_contributor(state, &model)
}

pub fn add_annotation(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let individual = state.resolve(ctx, &model, args.individual.as_deref(), "individual")?;
    let mut annotations = state.variables.annotations(required_values(args)?);
    annotations.extend(ctx.generated_annotations(state.actor.as_deref(), false));

    let changes = ctx.store.add_annotations(
        &model,
        &AnnotationTarget::Individual(individual.clone()),
        &annotations,
    )?;
    state.record(changes);

    state
        .variables
        .bind_opt(args.assign_to_variable.as_deref(), &individual);
    state.relevant_individuals.insert(individual);
    ctx.stamp_model_contributor(state, &model)
}

pub fn remove_annotation(
    ctx: &BatchContext<'_>,
    state: &mut BatchState,
    args: &Arguments,
) -> M3Result<()> {
    state.mark_non_meta()?;
    let model = state.model(ctx, args)?;
    let individual = state.resolve(ctx, &model, args.individual.as_deref(), "individual")?;
    let annotations = state.variables.annotations(required_values(args)?);

    let removal = ctx.store.remove_annotations(
        &model,
        &AnnotationTarget::Individual(individual.clone()),
        &annotations,
    )?;
    state.record(removal.changes);
    let swept = ctx.store.sweep_orphans(&model, &removal.orphan_candidates)?;
    state.record(swept);

    state
        .variables
        .bind_opt(args.assign_to_variable.as_deref(), &individual);
    state.relevant_individuals.insert(individual);
    ctx.stamp_model_contributor(state, &model)
}
