//! In-process storage adapter: string ids, no external engine.
//!
//! Backs the test suite and embedded demos. Unique-constraint groups behave
//! like storage-level unique indexes: a matching insert fails the whole call
//! before anything is written (chunk-atomic, like the relational adapters'
//! transactions).

use crate::descriptor::EntityDescriptor;
use crate::error::AppError;
use crate::page::{Page, PageRequest, SortDirection, SortSpec};
use crate::storage::{JsonObject, StorageAdapter};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct MemoryAdapter {
    rows: Mutex<Vec<JsonObject>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JsonObject>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn row_id<'a>(desc: &EntityDescriptor, row: &'a JsonObject) -> Option<&'a Value> {
    row.get(&desc.id_field)
}

fn matches_filters(row: &JsonObject, filters: &[(String, Value)]) -> bool {
    filters.iter().all(|(col, val)| {
        let cell = row.get(col).unwrap_or(&Value::Null);
        cell == val
    })
}

fn value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn sorted(mut rows: Vec<JsonObject>, desc: &EntityDescriptor, sort: Option<&SortSpec>) -> Vec<JsonObject> {
    let (field, direction) = match sort {
        Some(s) => (s.field.clone(), s.direction),
        None => (desc.id_field.clone(), SortDirection::Asc),
    };
    rows.sort_by(|a, b| {
        let ord = value_cmp(
            a.get(&field).unwrap_or(&Value::Null),
            b.get(&field).unwrap_or(&Value::Null),
        );
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    rows
}

/// Rejects rows that would violate a declared unique group against the
/// current contents plus the earlier rows of the same batch.
fn check_unique_index(
    desc: &EntityDescriptor,
    existing: &[JsonObject],
    pending: &[JsonObject],
    candidate: &JsonObject,
) -> Result<(), AppError> {
    for group in &desc.unique_groups {
        let values: Vec<&Value> = group
            .fields
            .iter()
            .map(|f| candidate.get(f).unwrap_or(&Value::Null))
            .collect();
        if values.iter().all(|v| v.is_null()) {
            continue;
        }
        let clash = existing.iter().chain(pending.iter()).any(|row| {
            group
                .fields
                .iter()
                .zip(&values)
                .all(|(f, v)| row.get(f).unwrap_or(&Value::Null) == *v)
        });
        if clash {
            return Err(AppError::Conflict(group.message.clone()));
        }
    }
    Ok(())
}

fn with_generated_id(desc: &EntityDescriptor, mut doc: JsonObject) -> JsonObject {
    if !doc.contains_key(&desc.id_field) {
        doc.insert(
            desc.id_field.clone(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
    doc
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn insert(&self, desc: &EntityDescriptor, doc: JsonObject) -> Result<Value, AppError> {
        let mut rows = self.lock();
        check_unique_index(desc, &rows, &[], &doc)?;
        let doc = with_generated_id(desc, doc);
        rows.push(doc.clone());
        Ok(Value::Object(doc))
    }

    async fn insert_many(
        &self,
        desc: &EntityDescriptor,
        docs: Vec<JsonObject>,
    ) -> Result<Vec<Value>, AppError> {
        let mut rows = self.lock();
        let mut pending: Vec<JsonObject> = Vec::with_capacity(docs.len());
        for doc in docs {
            check_unique_index(desc, &rows, &pending, &doc)?;
            pending.push(with_generated_id(desc, doc));
        }
        let out = pending.iter().cloned().map(Value::Object).collect();
        rows.extend(pending);
        Ok(out)
    }

    async fn find_by_id(
        &self,
        desc: &EntityDescriptor,
        id: &Value,
    ) -> Result<Option<Value>, AppError> {
        let rows = self.lock();
        Ok(rows
            .iter()
            .find(|r| row_id(desc, r) == Some(id))
            .cloned()
            .map(Value::Object))
    }

    async fn find_all(
        &self,
        desc: &EntityDescriptor,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<Value>, AppError> {
        let rows = self.lock().clone();
        Ok(sorted(rows, desc, sort)
            .into_iter()
            .map(Value::Object)
            .collect())
    }

    async fn find_page(
        &self,
        desc: &EntityDescriptor,
        req: &PageRequest,
    ) -> Result<Page, AppError> {
        let offset = req
            .offset()
            .ok_or_else(|| AppError::Validation("page number too large".into()))?;
        let rows = self.lock().clone();
        let total = rows.len() as u64;
        let sorted_rows = sorted(rows, desc, req.sort.as_ref());
        let start = offset.min(total) as usize;
        let end = (start + req.size as usize).min(sorted_rows.len());
        let content = sorted_rows[start..end]
            .iter()
            .cloned()
            .map(Value::Object)
            .collect();
        Ok(Page::new(content, req.page, req.size, total))
    }

    async fn update(
        &self,
        desc: &EntityDescriptor,
        id: &Value,
        patch: &JsonObject,
    ) -> Result<Option<Value>, AppError> {
        let mut rows = self.lock();
        let Some(row) = rows.iter_mut().find(|r| row_id(desc, r) == Some(id)) else {
            return Ok(None);
        };
        for (k, v) in patch {
            if k == &desc.id_field || !desc.has_field(k) {
                continue;
            }
            row.insert(k.clone(), v.clone());
        }
        Ok(Some(Value::Object(row.clone())))
    }

    async fn delete(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|r| row_id(desc, r) != Some(id));
        Ok(rows.len() < before)
    }

    async fn count(&self, _desc: &EntityDescriptor) -> Result<u64, AppError> {
        Ok(self.lock().len() as u64)
    }

    async fn exists(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError> {
        Ok(self.lock().iter().any(|r| row_id(desc, r) == Some(id)))
    }

    async fn exists_matching(
        &self,
        desc: &EntityDescriptor,
        filters: &[(String, Value)],
        exclude_id: Option<&Value>,
    ) -> Result<bool, AppError> {
        let rows = self.lock();
        Ok(rows.iter().any(|r| {
            if let Some(ex) = exclude_id {
                if row_id(desc, r) == Some(ex) {
                    return false;
                }
            }
            matches_filters(r, filters)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::EntityDefinition;

    fn descriptor() -> EntityDescriptor {
        let def: EntityDefinition = serde_json::from_value(serde_json::json!({
            "name": "users",
            "collection": "users",
            "id_strategy": "document",
            "fields": [
                {"name": "id"},
                {"name": "name"},
                {"name": "email"}
            ],
            "unique": [{"fields": ["email"]}]
        }))
        .unwrap();
        EntityDescriptor::resolve(def).unwrap()
    }

    fn obj(v: serde_json::Value) -> JsonObject {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_string_id() {
        let desc = descriptor();
        let adapter = MemoryAdapter::new();
        let stored = adapter
            .insert(&desc, obj(serde_json::json!({"name": "A", "email": "a@x.com"})))
            .await
            .unwrap();
        assert!(stored["id"].is_string());
        assert_eq!(adapter.count(&desc).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_unique_group_is_a_conflict() {
        let desc = descriptor();
        let adapter = MemoryAdapter::new();
        adapter
            .insert(&desc, obj(serde_json::json!({"name": "A", "email": "a@x.com"})))
            .await
            .unwrap();
        let err = adapter
            .insert(&desc, obj(serde_json::json!({"name": "B", "email": "a@x.com"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn insert_many_is_chunk_atomic() {
        let desc = descriptor();
        let adapter = MemoryAdapter::new();
        let docs = vec![
            obj(serde_json::json!({"name": "A", "email": "a@x.com"})),
            obj(serde_json::json!({"name": "B", "email": "a@x.com"})),
        ];
        assert!(adapter.insert_many(&desc, docs).await.is_err());
        assert_eq!(adapter.count(&desc).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn page_slices_sorted_rows() {
        let desc = descriptor();
        let adapter = MemoryAdapter::new();
        for i in 0..5 {
            adapter
                .insert(
                    &desc,
                    obj(serde_json::json!({"name": format!("u{i}"), "email": format!("{i}@x.com")})),
                )
                .await
                .unwrap();
        }
        let page = adapter
            .find_page(
                &desc,
                &PageRequest {
                    page: 1,
                    size: 2,
                    sort: Some(SortSpec {
                        field: "name".into(),
                        direction: SortDirection::Asc,
                    }),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.content.len(), 2);
        assert_eq!(page.content[0]["name"], "u2");
    }

    #[tokio::test]
    async fn overflowing_page_offset_is_a_validation_error() {
        let desc = descriptor();
        let adapter = MemoryAdapter::new();
        let err = adapter
            .find_page(
                &desc,
                &PageRequest {
                    page: u64::MAX,
                    size: 2,
                    sort: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn update_merges_and_delete_reports_absence() {
        let desc = descriptor();
        let adapter = MemoryAdapter::new();
        let stored = adapter
            .insert(&desc, obj(serde_json::json!({"name": "A", "email": "a@x.com"})))
            .await
            .unwrap();
        let id = stored["id"].clone();
        let updated = adapter
            .update(&desc, &id, &obj(serde_json::json!({"name": "B"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["name"], "B");
        assert_eq!(updated["email"], "a@x.com");
        assert!(adapter.delete(&desc, &id).await.unwrap());
        assert!(!adapter.delete(&desc, &id).await.unwrap());
    }
}
