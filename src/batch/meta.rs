//! `relations/get` and `evidence/get`: reads of the configured vocabulary.

use crate::batch::{BatchContext, BatchState};
use crate::error::M3Result;
use crate::request::Arguments;
use crate::response::{EvidenceJson, RelationJson};

pub fn relations(ctx: &BatchContext<'_>, state: &mut BatchState, _args: &Arguments) -> M3Result<()> {
    state.mark_meta("Get Relations")?;
    state.meta.relations = Some(
        ctx.config
            .vocabulary
            .relations
            .iter()
            .map(|r| RelationJson {
                id: r.id.clone(),
                label: r.label.clone(),
                relevant: r.relevant,
            })
            .collect(),
    );
    Ok(())
}

pub fn evidence(ctx: &BatchContext<'_>, state: &mut BatchState, _args: &Arguments) -> M3Result<()> {
    state.mark_meta("Get Evidence")?;
    state.meta.evidence = Some(
        ctx.config
            .vocabulary
            .evidence
            .iter()
            .map(|e| EvidenceJson {
                id: e.id.clone(),
                label: e.label.clone(),
            })
            .collect(),
    );
    Ok(())
}
