//! Declarative uniqueness enforcement: pre-insert conflict detection.
//!
//! This is a best-effort fast path. Concurrent identical writers can both
//! pass the check; the storage engine's unique index is the final authority
//! and its violation surfaces as a conflict as well.

use crate::descriptor::EntityDescriptor;
use crate::error::{AppError, ConflictDescription};
use crate::storage::{JsonObject, StorageAdapter};
use serde_json::Value;

/// Checks the candidate against every declared unique-constraint group.
/// Returns one description per violated group; all groups are checked so the
/// caller can report every conflict at once. `exclude_id` skips the entity's
/// own record on updates. Groups whose fields are all null on the candidate
/// are not checked.
pub async fn check_conflicts(
    adapter: &dyn StorageAdapter,
    desc: &EntityDescriptor,
    candidate: &JsonObject,
    exclude_id: Option<&Value>,
) -> Result<Vec<ConflictDescription>, AppError> {
    let mut violations = Vec::new();
    for group in &desc.unique_groups {
        let filters: Vec<(String, Value)> = group
            .fields
            .iter()
            .map(|f| (f.clone(), candidate.get(f).cloned().unwrap_or(Value::Null)))
            .collect();
        if filters.iter().all(|(_, v)| v.is_null()) {
            continue;
        }
        if adapter.exists_matching(desc, &filters, exclude_id).await? {
            violations.push(ConflictDescription {
                fields: group.fields.clone(),
                message: group.message.clone(),
            });
        }
    }
    Ok(violations)
}
