//! Raw entity definition types matching the JSON registration document.

use serde::{Deserialize, Serialize};

/// Identifier assignment strategy. Selects the storage adapter at
/// registration: `document` -> MongoDB (string id), `sequence` -> PostgreSQL
/// (id pre-allocated from the named sequence), `identity` -> MySQL
/// (auto-increment id read back after insert).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategyDef {
    Document,
    Sequence(String),
    Identity,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// Column type for relational engines (e.g. "bigint", "text",
    /// "timestamptz"). Ignored by the document store.
    #[serde(default)]
    pub sql_type: Option<String>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Column has a database-side default; omitted body values are left to
    /// the database on insert.
    #[serde(default)]
    pub has_default: bool,
}

fn default_true() -> bool {
    true
}

/// One declared uniqueness group: the named fields are jointly unique.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UniqueGroupDef {
    pub fields: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Audit slot declarations: each names the entity field the stamper manages.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditDef {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Entity type identifier; also the URL path segment.
    pub name: String,
    /// Table or collection name.
    pub collection: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    pub id_strategy: IdStrategyDef,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub unique: Vec<UniqueGroupDef>,
    #[serde(default)]
    pub audit: Option<AuditDef>,
}

fn default_id_field() -> String {
    "id".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_deserializes_with_defaults() {
        let def: EntityDefinition = serde_json::from_value(serde_json::json!({
            "name": "users",
            "collection": "users",
            "id_strategy": "document",
            "fields": [
                {"name": "id"},
                {"name": "email", "nullable": false}
            ],
            "unique": [{"fields": ["email"]}]
        }))
        .unwrap();
        assert_eq!(def.id_field, "id");
        assert!(matches!(def.id_strategy, IdStrategyDef::Document));
        assert!(def.fields[0].nullable);
        assert!(!def.fields[1].nullable);
        assert!(def.audit.is_none());
    }

    #[test]
    fn sequence_strategy_carries_sequence_name() {
        let def: EntityDefinition = serde_json::from_value(serde_json::json!({
            "name": "orders",
            "collection": "orders",
            "id_strategy": {"sequence": "orders_id_seq"},
            "fields": [{"name": "id", "sql_type": "bigint"}]
        }))
        .unwrap();
        match def.id_strategy {
            IdStrategyDef::Sequence(seq) => assert_eq!(seq, "orders_id_seq"),
            other => panic!("expected sequence strategy, got {other:?}"),
        }
    }
}
