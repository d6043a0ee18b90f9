//! Permission gate for batch operations.
//!
//! Unprivileged callers may only read: `get`, `export`, `export-legacy`,
//! `all-model-ids` and `all-model-meta`, on any entity. Everything else
//! needs a privileged call.

use crate::error::BatchError;
use crate::request::{EntityKind, Operation};

/// Whether `operation` is allowed without privileges.
pub fn is_unprivileged(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::Get
            | Operation::Export
            | Operation::ExportLegacy
            | Operation::AllModelIds
            | Operation::AllModelMeta
    )
}

/// Accept or reject `operation` on `entity` for the given privilege level.
pub fn check(entity: EntityKind, operation: Operation, privileged: bool) -> Result<(), BatchError> {
    if privileged || is_unprivileged(operation) {
        return Ok(());
    }
    Err(BatchError::InsufficientPermission {
        entity: entity.label().to_string(),
        operation: operation.label().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_callers_may_do_anything() {
        for op in Operation::ALL {
            assert!(check(EntityKind::Model, op, true).is_ok());
        }
    }

    #[test]
    fn unprivileged_allow_list() {
        let allowed: Vec<_> = Operation::ALL
            .into_iter()
            .filter(|op| check(EntityKind::Model, *op, false).is_ok())
            .collect();
        assert_eq!(
            allowed,
            vec![
                Operation::Get,
                Operation::Export,
                Operation::ExportLegacy,
                Operation::AllModelIds,
                Operation::AllModelMeta,
            ]
        );
    }

    #[test]
    fn denial_names_entity_and_operation() {
        let err = check(EntityKind::Individual, Operation::AddType, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient permissions for the operation add-type on entity: individual"
        );
    }
}
