//! The CRUD service engine: one instance per registered entity type.
//!
//! Stateless between calls; orchestrates audit stamping, uniqueness
//! enforcement, batch processing, and the storage adapter behind a single
//! typed contract.

use crate::descriptor::{EntityDescriptor, IdKind};
use crate::error::AppError;
use crate::page::{Page, PageRequest, SortSpec};
use crate::service::audit::AuditStamper;
use crate::service::batch::{self, BatchReport};
use crate::service::uniqueness::check_conflicts;
use crate::storage::{JsonObject, StorageAdapter};
use crate::telemetry::TelemetrySink;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

pub struct CrudEngine {
    descriptor: Arc<EntityDescriptor>,
    adapter: Arc<dyn StorageAdapter>,
    stamper: AuditStamper,
    telemetry: Arc<dyn TelemetrySink>,
    chunk_size: usize,
}

impl CrudEngine {
    pub fn new(
        descriptor: Arc<EntityDescriptor>,
        adapter: Arc<dyn StorageAdapter>,
        stamper: AuditStamper,
        telemetry: Arc<dyn TelemetrySink>,
        chunk_size: usize,
    ) -> Self {
        CrudEngine {
            descriptor,
            adapter,
            stamper,
            telemetry,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Runs one operation and stamps its wall time, on success and failure
    /// alike.
    async fn observe<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        let started = Instant::now();
        let result = fut.await;
        self.telemetry
            .operation_timing(&self.descriptor.name, operation, started.elapsed());
        result
    }

    fn validate_sort(&self, sort: Option<&SortSpec>) -> Result<(), AppError> {
        if let Some(s) = sort {
            if !self.descriptor.has_field(&s.field) {
                return Err(AppError::Validation(format!(
                    "unknown sort field '{}'",
                    s.field
                )));
            }
        }
        Ok(())
    }

    /// Create one entity: stamp audit slots, enforce declared uniqueness,
    /// persist. A caller-supplied identifier is ignored; every strategy
    /// assigns ids at the storage layer.
    pub async fn create(&self, mut doc: JsonObject) -> Result<Value, AppError> {
        self.observe("create", async {
            doc.remove(&self.descriptor.id_field);
            self.stamper.stamp_create(&self.descriptor, &mut doc);
            let conflicts =
                check_conflicts(self.adapter.as_ref(), &self.descriptor, &doc, None).await?;
            if !conflicts.is_empty() {
                return Err(AppError::UniqueViolation(conflicts));
            }
            self.adapter.insert(&self.descriptor, doc).await
        })
        .await
    }

    /// Batch create with chunked partial-failure semantics.
    pub async fn create_batch(&self, entities: Vec<JsonObject>) -> Result<BatchReport, AppError> {
        self.observe("createBatch", async {
            batch::process(
                self.adapter.as_ref(),
                &self.descriptor,
                &self.stamper,
                self.telemetry.as_ref(),
                entities,
                self.chunk_size,
            )
            .await
        })
        .await
    }

    pub async fn find_by_id(&self, id: &Value) -> Result<Value, AppError> {
        self.observe("findById", async {
            self.adapter
                .find_by_id(&self.descriptor, id)
                .await?
                .ok_or_else(|| self.not_found(id))
        })
        .await
    }

    pub async fn find_all(&self, sort: Option<SortSpec>) -> Result<Vec<Value>, AppError> {
        self.observe("findAll", async {
            self.validate_sort(sort.as_ref())?;
            self.adapter.find_all(&self.descriptor, sort.as_ref()).await
        })
        .await
    }

    pub async fn find_page(&self, req: PageRequest) -> Result<Page, AppError> {
        self.observe("findPage", async {
            if req.size == 0 {
                return Err(AppError::Validation("page size must be positive".into()));
            }
            self.validate_sort(req.sort.as_ref())?;
            self.adapter.find_page(&self.descriptor, &req).await
        })
        .await
    }

    /// Partial update: fetch-first (404 on miss), stamp update slots,
    /// enforce uniqueness against the merged view excluding this entity,
    /// then persist only the supplied fields.
    pub async fn update(&self, id: &Value, mut patch: JsonObject) -> Result<Value, AppError> {
        self.observe("update", async {
            patch.remove(&self.descriptor.id_field);
            let existing = self
                .adapter
                .find_by_id(&self.descriptor, id)
                .await?
                .ok_or_else(|| self.not_found(id))?;
            self.stamper.stamp_update(&self.descriptor, &mut patch);

            let mut merged = match existing {
                Value::Object(m) => m,
                _ => JsonObject::new(),
            };
            for (k, v) in &patch {
                merged.insert(k.clone(), v.clone());
            }
            let conflicts =
                check_conflicts(self.adapter.as_ref(), &self.descriptor, &merged, Some(id)).await?;
            if !conflicts.is_empty() {
                return Err(AppError::UniqueViolation(conflicts));
            }

            self.adapter
                .update(&self.descriptor, id, &patch)
                .await?
                .ok_or_else(|| self.not_found(id))
        })
        .await
    }

    /// Delete by identifier; absence is an error at this layer.
    pub async fn delete(&self, id: &Value) -> Result<(), AppError> {
        self.observe("delete", async {
            if !self.adapter.delete(&self.descriptor, id).await? {
                return Err(self.not_found(id));
            }
            Ok(())
        })
        .await
    }

    pub async fn count(&self) -> Result<u64, AppError> {
        self.observe("count", self.adapter.count(&self.descriptor))
            .await
    }

    pub async fn exists(&self, id: &Value) -> Result<bool, AppError> {
        self.observe("exists", self.adapter.exists(&self.descriptor, id))
            .await
    }

    /// Parses a path identifier per the descriptor's id kind.
    pub fn parse_id(&self, raw: &str) -> Result<Value, AppError> {
        match self.descriptor.id_kind {
            IdKind::DocumentString => Ok(Value::String(raw.to_string())),
            IdKind::SequenceLong | IdKind::IdentityLong => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| AppError::Validation(format!("invalid numeric id '{raw}'"))),
        }
    }

    fn not_found(&self, id: &Value) -> AppError {
        let id = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        AppError::NotFound(format!("{} '{}'", self.descriptor.name, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::EntityDefinition;
    use crate::page::SortDirection;
    use crate::storage::MemoryAdapter;
    use crate::telemetry::LogSink;
    use std::sync::Mutex;

    fn definition() -> EntityDefinition {
        serde_json::from_value(serde_json::json!({
            "name": "users",
            "collection": "users",
            "id_strategy": "document",
            "fields": [
                {"name": "id"},
                {"name": "name"},
                {"name": "email"},
                {"name": "created_at"},
                {"name": "updated_at"}
            ],
            "unique": [{"fields": ["email"], "message": "email already registered"}],
            "audit": {"created_at": "created_at", "updated_at": "updated_at"}
        }))
        .unwrap()
    }

    fn engine() -> CrudEngine {
        engine_with_sink(Arc::new(LogSink))
    }

    fn engine_with_sink(sink: Arc<dyn TelemetrySink>) -> CrudEngine {
        let desc = Arc::new(EntityDescriptor::resolve(definition()).unwrap());
        CrudEngine::new(
            desc,
            Arc::new(MemoryAdapter::new()),
            AuditStamper::new(),
            sink,
            1000,
        )
    }

    fn obj(v: serde_json::Value) -> JsonObject {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    /// Records operation names for assertions.
    #[derive(Default)]
    struct RecordingSink {
        operations: Mutex<Vec<String>>,
    }

    impl TelemetrySink for RecordingSink {
        fn batch_progress(
            &self,
            _entity: &str,
            _chunk_index: usize,
            _chunk_size: usize,
            _processed: usize,
            _total: usize,
        ) {
        }

        fn operation_timing(&self, _entity: &str, operation: &str, _elapsed: std::time::Duration) {
            self.operations.lock().unwrap().push(operation.to_string());
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_identical_audit_timestamps() {
        let engine = engine();
        let stored = engine
            .create(obj(serde_json::json!({"name": "A", "email": "a@x.com"})))
            .await
            .unwrap();
        assert!(stored["id"].is_string());
        assert_eq!(stored["created_at"], stored["updated_at"]);
    }

    #[tokio::test]
    async fn duplicate_create_reports_violated_group() {
        let engine = engine();
        engine
            .create(obj(serde_json::json!({"name": "A", "email": "a@x.com"})))
            .await
            .unwrap();
        let err = engine
            .create(obj(serde_json::json!({"name": "B", "email": "a@x.com"})))
            .await
            .unwrap_err();
        match err {
            AppError::UniqueViolation(groups) => {
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].fields, vec!["email"]);
                assert_eq!(groups[0].message, "email already registered");
            }
            other => panic!("expected unique violation, got {other}"),
        }
    }

    #[tokio::test]
    async fn caller_supplied_id_is_ignored_on_create() {
        let engine = engine();
        let stored = engine
            .create(obj(serde_json::json!({"id": "forced", "email": "a@x.com"})))
            .await
            .unwrap();
        assert_ne!(stored["id"], "forced");
    }

    #[tokio::test]
    async fn partial_update_preserves_omitted_fields_and_creation_stamp() {
        let engine = engine();
        let stored = engine
            .create(obj(serde_json::json!({"name": "A", "email": "a@x.com"})))
            .await
            .unwrap();
        let id = stored["id"].clone();
        let created_at = stored["created_at"].clone();

        let updated = engine
            .update(&id, obj(serde_json::json!({"name": "B"})))
            .await
            .unwrap();
        assert_eq!(updated["name"], "B");
        assert_eq!(updated["email"], "a@x.com");
        assert_eq!(updated["created_at"], created_at);
        assert!(updated["updated_at"].is_string());
    }

    #[tokio::test]
    async fn update_to_taken_unique_value_conflicts_but_own_value_passes() {
        let engine = engine();
        engine
            .create(obj(serde_json::json!({"email": "a@x.com"})))
            .await
            .unwrap();
        let second = engine
            .create(obj(serde_json::json!({"email": "b@x.com"})))
            .await
            .unwrap();
        let id = second["id"].clone();

        // keeping the same email is not a self-conflict
        engine
            .update(&id, obj(serde_json::json!({"email": "b@x.com"})))
            .await
            .unwrap();
        // taking another entity's email is
        let err = engine
            .update(&id, obj(serde_json::json!({"email": "a@x.com"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn missing_ids_surface_as_not_found() {
        let engine = engine();
        let id = Value::String("nope".into());
        assert!(matches!(
            engine.find_by_id(&id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            engine
                .update(&id, obj(serde_json::json!({"name": "B"})))
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            engine.delete(&id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn count_and_exists_are_side_effect_free() {
        let engine = engine();
        let stored = engine
            .create(obj(serde_json::json!({"email": "a@x.com"})))
            .await
            .unwrap();
        let id = stored["id"].clone();
        for _ in 0..3 {
            assert_eq!(engine.count().await.unwrap(), 1);
            assert!(engine.exists(&id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn find_page_rejects_zero_size_and_unknown_sort() {
        let engine = engine();
        let err = engine
            .find_page(PageRequest {
                page: 0,
                size: 0,
                sort: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = engine
            .find_all(Some(SortSpec {
                field: "nope".into(),
                direction: SortDirection::Asc,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn failed_operations_still_emit_timing() {
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_with_sink(sink.clone());
        let id = Value::String("nope".into());
        assert!(engine.find_by_id(&id).await.is_err());
        assert!(engine.delete(&id).await.is_err());
        assert!(engine
            .create(obj(serde_json::json!({"email": null})))
            .await
            .is_ok());
        let ops = sink.operations.lock().unwrap();
        assert_eq!(*ops, vec!["findById", "delete", "create"]);
    }

    #[tokio::test]
    async fn parse_id_follows_id_kind() {
        let engine = engine();
        assert_eq!(engine.parse_id("abc").unwrap(), Value::String("abc".into()));
    }
}
