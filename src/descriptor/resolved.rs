//! Resolved entity descriptor: definition validated and flattened for
//! runtime use. Immutable after construction.

use crate::descriptor::types::{AuditDef, EntityDefinition, FieldDef, IdStrategyDef};
use crate::error::ConfigError;
use std::collections::HashSet;

/// Identifier kind tag; the registry selects the storage adapter by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdKind {
    /// String id generated by the document store.
    DocumentString,
    /// Numeric id pre-allocated from a database sequence.
    SequenceLong,
    /// Numeric id assigned by the database on insert (auto-increment).
    IdentityLong,
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    pub sql_type: Option<String>,
    pub nullable: bool,
    pub has_default: bool,
}

#[derive(Clone, Debug)]
pub struct UniqueGroup {
    pub fields: Vec<String>,
    pub message: String,
}

/// Audit slots resolved to concrete field names, where declared.
#[derive(Clone, Debug, Default)]
pub struct AuditSlots {
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl AuditSlots {
    /// Fields set only at creation and immutable afterwards.
    pub fn creation_fields(&self) -> impl Iterator<Item = &str> {
        self.created_at
            .as_deref()
            .into_iter()
            .chain(self.created_by.as_deref())
    }
}

#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    pub name: String,
    pub collection: String,
    pub id_field: String,
    pub id_kind: IdKind,
    /// Sequence name for [`IdKind::SequenceLong`].
    pub sequence: Option<String>,
    pub fields: Vec<FieldInfo>,
    pub unique_groups: Vec<UniqueGroup>,
    pub audit: AuditSlots,
}

impl EntityDescriptor {
    /// Validates a raw definition and builds the immutable descriptor.
    /// Every referenced field name must exist in the field set; relational
    /// strategies additionally require a SQL type on every field so the
    /// query builder can emit parameter casts.
    pub fn resolve(def: EntityDefinition) -> Result<Self, ConfigError> {
        let entity = def.name.clone();
        if entity.trim().is_empty() {
            return Err(ConfigError::Invalid {
                entity,
                message: "entity name must be non-empty".into(),
            });
        }
        if def.collection.trim().is_empty() {
            return Err(ConfigError::Invalid {
                entity,
                message: "collection name must be non-empty".into(),
            });
        }
        if def.fields.is_empty() {
            return Err(ConfigError::Invalid {
                entity,
                message: "at least one field required".into(),
            });
        }

        let mut seen = HashSet::new();
        for f in &def.fields {
            if f.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    entity,
                    message: "field names must be non-empty".into(),
                });
            }
            if !seen.insert(f.name.as_str()) {
                return Err(ConfigError::Invalid {
                    entity,
                    message: format!("duplicate field '{}'", f.name),
                });
            }
        }

        let field_names: HashSet<&str> = def.fields.iter().map(|f| f.name.as_str()).collect();
        if !field_names.contains(def.id_field.as_str()) {
            return Err(ConfigError::MissingIdField {
                entity,
                field: def.id_field,
            });
        }

        let (id_kind, sequence) = match &def.id_strategy {
            IdStrategyDef::Document => (IdKind::DocumentString, None),
            IdStrategyDef::Sequence(seq) => {
                if seq.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        entity,
                        message: "sequence name must be non-empty".into(),
                    });
                }
                (IdKind::SequenceLong, Some(seq.clone()))
            }
            IdStrategyDef::Identity => (IdKind::IdentityLong, None),
        };

        if matches!(id_kind, IdKind::SequenceLong | IdKind::IdentityLong) {
            if let Some(f) = def.fields.iter().find(|f| f.sql_type.is_none()) {
                return Err(ConfigError::Invalid {
                    entity,
                    message: format!(
                        "field '{}' must declare sql_type for a relational id strategy",
                        f.name
                    ),
                });
            }
        }

        let mut unique_groups = Vec::with_capacity(def.unique.len());
        for group in &def.unique {
            if group.fields.is_empty() {
                return Err(ConfigError::Invalid {
                    entity,
                    message: "unique constraint group must name at least one field".into(),
                });
            }
            for f in &group.fields {
                if !field_names.contains(f.as_str()) {
                    return Err(ConfigError::UnknownConstraintField {
                        entity,
                        field: f.clone(),
                    });
                }
            }
            let message = group
                .message
                .clone()
                .unwrap_or_else(|| format!("duplicate value for unique fields: {}", group.fields.join(", ")));
            unique_groups.push(UniqueGroup {
                fields: group.fields.clone(),
                message,
            });
        }

        let audit = resolve_audit(&entity, def.audit.as_ref(), &field_names, &def.id_field)?;

        Ok(EntityDescriptor {
            name: def.name,
            collection: def.collection,
            id_field: def.id_field,
            id_kind,
            sequence,
            fields: def
                .fields
                .into_iter()
                .map(|f: FieldDef| FieldInfo {
                    name: f.name,
                    sql_type: f.sql_type,
                    nullable: f.nullable,
                    has_default: f.has_default,
                })
                .collect(),
            unique_groups,
            audit,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn id_field_info(&self) -> &FieldInfo {
        // resolve() guarantees the id field exists
        self.fields
            .iter()
            .find(|f| f.name == self.id_field)
            .unwrap_or(&self.fields[0])
    }
}

fn resolve_audit(
    entity: &str,
    audit: Option<&AuditDef>,
    field_names: &HashSet<&str>,
    id_field: &str,
) -> Result<AuditSlots, ConfigError> {
    let Some(audit) = audit else {
        return Ok(AuditSlots::default());
    };
    let mut slots = AuditSlots::default();
    let declared = [
        ("created_at", &audit.created_at),
        ("updated_at", &audit.updated_at),
        ("created_by", &audit.created_by),
        ("updated_by", &audit.updated_by),
    ];
    for (slot, field) in declared {
        let Some(field) = field else { continue };
        if !field_names.contains(field.as_str()) || field == id_field {
            return Err(ConfigError::UnknownAuditField {
                entity: entity.to_string(),
                slot,
                field: field.clone(),
            });
        }
        match slot {
            "created_at" => slots.created_at = Some(field.clone()),
            "updated_at" => slots.updated_at = Some(field.clone()),
            "created_by" => slots.created_by = Some(field.clone()),
            _ => slots.updated_by = Some(field.clone()),
        }
    }
    Ok(slots)
}
