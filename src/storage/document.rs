//! MongoDB adapter: schemaless documents, string ids from the driver's
//! native ObjectId generation.
//!
//! The descriptor's identifier field is mapped to `_id` on the wire and back
//! to the declared name on every read. `insert_many` uses an ordered bulk
//! write, which is not transactional: on failure some leading documents may
//! already be persisted even though the whole chunk is reported failed.

use crate::descriptor::EntityDescriptor;
use crate::error::AppError;
use crate::page::{Page, PageRequest, SortDirection, SortSpec};
use crate::storage::{JsonObject, StorageAdapter};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use serde_json::Value;

pub struct DocumentAdapter {
    db: mongodb::Database,
}

impl DocumentAdapter {
    pub fn new(db: mongodb::Database) -> Self {
        DocumentAdapter { db }
    }

    fn collection(&self, desc: &EntityDescriptor) -> Collection<Document> {
        self.db.collection(&desc.collection)
    }
}

fn json_to_bson(v: &Value) -> Result<Bson, AppError> {
    bson::to_bson(v).map_err(|e| AppError::Persistence(format!("bson encode: {e}")))
}

/// Identifier value as stored: hex strings become ObjectIds, everything else
/// is stored verbatim.
fn id_to_bson(id: &Value) -> Result<Bson, AppError> {
    if let Value::String(s) = id {
        if let Ok(oid) = ObjectId::parse_str(s) {
            return Ok(Bson::ObjectId(oid));
        }
    }
    json_to_bson(id)
}

fn to_document(desc: &EntityDescriptor, doc: &JsonObject) -> Result<Document, AppError> {
    let mut body = doc.clone();
    body.remove(&desc.id_field);
    bson::to_document(&body).map_err(|e| AppError::Persistence(format!("bson encode: {e}")))
}

fn from_document(desc: &EntityDescriptor, mut d: Document) -> Result<Value, AppError> {
    let id = d.remove("_id");
    let mut out = serde_json::to_value(&d)
        .map_err(|e| AppError::Persistence(format!("bson decode: {e}")))?;
    if let (Some(obj), Some(id)) = (out.as_object_mut(), id) {
        let id_value = match id {
            Bson::ObjectId(oid) => Value::String(oid.to_hex()),
            other => serde_json::to_value(&other)
                .map_err(|e| AppError::Persistence(format!("bson decode: {e}")))?,
        };
        obj.insert(desc.id_field.clone(), id_value);
    }
    Ok(out)
}

fn sort_document(desc: &EntityDescriptor, sort: Option<&SortSpec>) -> Document {
    match sort {
        Some(s) => {
            let field = if s.field == desc.id_field { "_id" } else { s.field.as_str() };
            let dir = match s.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            doc! { field: dir }
        }
        None => doc! { "_id": 1 },
    }
}

#[async_trait]
impl StorageAdapter for DocumentAdapter {
    async fn insert(&self, desc: &EntityDescriptor, doc: JsonObject) -> Result<Value, AppError> {
        let mut d = to_document(desc, &doc)?;
        d.insert("_id", ObjectId::new());
        self.collection(desc).insert_one(d.clone(), None).await?;
        from_document(desc, d)
    }

    async fn insert_many(
        &self,
        desc: &EntityDescriptor,
        docs: Vec<JsonObject>,
    ) -> Result<Vec<Value>, AppError> {
        let mut wire = Vec::with_capacity(docs.len());
        for doc in &docs {
            let mut d = to_document(desc, doc)?;
            d.insert("_id", ObjectId::new());
            wire.push(d);
        }
        self.collection(desc).insert_many(wire.clone(), None).await?;
        wire.into_iter().map(|d| from_document(desc, d)).collect()
    }

    async fn find_by_id(
        &self,
        desc: &EntityDescriptor,
        id: &Value,
    ) -> Result<Option<Value>, AppError> {
        let filter = doc! { "_id": id_to_bson(id)? };
        let found = self.collection(desc).find_one(filter, None).await?;
        found.map(|d| from_document(desc, d)).transpose()
    }

    async fn find_all(
        &self,
        desc: &EntityDescriptor,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<Value>, AppError> {
        let options = FindOptions::builder()
            .sort(sort_document(desc, sort))
            .build();
        let cursor = self.collection(desc).find(None, options).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        docs.into_iter().map(|d| from_document(desc, d)).collect()
    }

    async fn find_page(
        &self,
        desc: &EntityDescriptor,
        req: &PageRequest,
    ) -> Result<Page, AppError> {
        let offset = req
            .offset()
            .ok_or_else(|| AppError::Validation("page number too large".into()))?;
        let coll = self.collection(desc);
        let total = coll.count_documents(None, None).await?;
        let options = FindOptions::builder()
            .sort(sort_document(desc, req.sort.as_ref()))
            .skip(offset)
            .limit(req.size as i64)
            .build();
        let cursor = coll.find(None, options).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        let content = docs
            .into_iter()
            .map(|d| from_document(desc, d))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(content, req.page, req.size, total))
    }

    async fn update(
        &self,
        desc: &EntityDescriptor,
        id: &Value,
        patch: &JsonObject,
    ) -> Result<Option<Value>, AppError> {
        let filter = doc! { "_id": id_to_bson(id)? };
        let set = to_document(desc, patch)?;
        if set.is_empty() {
            return self.find_by_id(desc, id).await;
        }
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .collection(desc)
            .find_one_and_update(filter, doc! { "$set": set }, options)
            .await?;
        updated.map(|d| from_document(desc, d)).transpose()
    }

    async fn delete(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError> {
        let filter = doc! { "_id": id_to_bson(id)? };
        let result = self.collection(desc).delete_one(filter, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, desc: &EntityDescriptor) -> Result<u64, AppError> {
        Ok(self.collection(desc).count_documents(None, None).await?)
    }

    async fn exists(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError> {
        let filter = doc! { "_id": id_to_bson(id)? };
        Ok(self.collection(desc).find_one(filter, None).await?.is_some())
    }

    async fn exists_matching(
        &self,
        desc: &EntityDescriptor,
        filters: &[(String, Value)],
        exclude_id: Option<&Value>,
    ) -> Result<bool, AppError> {
        let mut filter = Document::new();
        for (col, val) in filters {
            if col == &desc.id_field {
                filter.insert("_id", id_to_bson(val)?);
            } else {
                filter.insert(col.clone(), json_to_bson(val)?);
            }
        }
        if let Some(id) = exclude_id {
            filter.insert("_id", doc! { "$ne": id_to_bson(id)? });
        }
        Ok(self.collection(desc).find_one(filter, None).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EntityDefinition, EntityDescriptor};

    fn descriptor() -> EntityDescriptor {
        let def: EntityDefinition = serde_json::from_value(serde_json::json!({
            "name": "notes",
            "collection": "notes",
            "id_strategy": "document",
            "fields": [{"name": "id"}, {"name": "title"}]
        }))
        .unwrap();
        EntityDescriptor::resolve(def).unwrap()
    }

    #[test]
    fn round_trips_id_field_through_wire_format() {
        let desc = descriptor();
        let oid = ObjectId::new();
        let mut d = Document::new();
        d.insert("_id", oid);
        d.insert("title", "hello");
        let v = from_document(&desc, d).unwrap();
        assert_eq!(v["id"], Value::String(oid.to_hex()));
        assert_eq!(v["title"], "hello");

        let obj = match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let wire = to_document(&desc, &obj).unwrap();
        assert!(!wire.contains_key("_id"));
        assert!(!wire.contains_key("id"));
        assert_eq!(wire.get_str("title").unwrap(), "hello");
    }

    #[test]
    fn hex_ids_become_object_ids() {
        let oid = ObjectId::new();
        let b = id_to_bson(&Value::String(oid.to_hex())).unwrap();
        assert_eq!(b, Bson::ObjectId(oid));
        let b = id_to_bson(&Value::String("not-an-oid".into())).unwrap();
        assert_eq!(b, Bson::String("not-an-oid".into()));
    }

    #[test]
    fn sort_maps_id_field_to_underscore_id() {
        let desc = descriptor();
        let s = SortSpec {
            field: "id".into(),
            direction: SortDirection::Desc,
        };
        assert_eq!(sort_document(&desc, Some(&s)), doc! { "_id": -1 });
        assert_eq!(sort_document(&desc, None), doc! { "_id": 1 });
    }
}
