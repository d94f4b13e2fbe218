//! Audit stamping: system-managed timestamp and actor fields.

use crate::descriptor::EntityDescriptor;
use crate::storage::JsonObject;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Resolves the current actor identifier (e.g. from request auth context).
pub type ActorResolver = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct AuditStamper {
    actor: Option<ActorResolver>,
}

impl AuditStamper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(actor: ActorResolver) -> Self {
        AuditStamper { actor: Some(actor) }
    }

    fn now() -> String {
        Utc::now().to_rfc3339()
    }

    fn actor(&self) -> Option<String> {
        self.actor.as_ref().and_then(|resolve| resolve())
    }

    /// Create mode: creation and update timestamps get one identical value;
    /// caller-supplied values for any audit slot are overwritten.
    pub fn stamp_create(&self, desc: &EntityDescriptor, doc: &mut JsonObject) {
        let now = Self::now();
        for slot in [&desc.audit.created_at, &desc.audit.updated_at] {
            if let Some(field) = slot {
                doc.insert(field.clone(), Value::String(now.clone()));
            }
        }
        let actor = self.actor();
        for slot in [&desc.audit.created_by, &desc.audit.updated_by] {
            if let Some(field) = slot {
                match &actor {
                    Some(a) => doc.insert(field.clone(), Value::String(a.clone())),
                    None => doc.remove(field),
                };
            }
        }
    }

    /// Update mode: only the update slots are touched; creation slots are
    /// stripped from the patch so they can never change post-create.
    pub fn stamp_update(&self, desc: &EntityDescriptor, patch: &mut JsonObject) {
        for field in desc.audit.creation_fields() {
            patch.remove(field);
        }
        if let Some(field) = &desc.audit.updated_at {
            patch.insert(field.clone(), Value::String(Self::now()));
        }
        if let Some(field) = &desc.audit.updated_by {
            match self.actor() {
                Some(a) => patch.insert(field.clone(), Value::String(a)),
                None => patch.remove(field),
            };
        }
    }
}
