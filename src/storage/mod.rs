//! Storage adapters: one uniform operation set per storage engine.
//!
//! The engine calls every adapter identically; identifier assignment is the
//! adapter's concern (document store generates string ids, the sequence
//! adapter pre-allocates from a database sequence, the identity adapter
//! reads the auto-increment value back after insert).

pub mod document;
pub mod identity;
pub mod memory;
pub mod sequence;

pub use document::DocumentAdapter;
pub use identity::IdentityAdapter;
pub use memory::MemoryAdapter;
pub use sequence::SequenceAdapter;

use crate::descriptor::EntityDescriptor;
use crate::error::AppError;
use crate::page::{Page, PageRequest, SortSpec};
use async_trait::async_trait;
use serde_json::Value;

/// Entities cross the adapter boundary as JSON objects.
pub type JsonObject = serde_json::Map<String, Value>;

/// Uniform storage contract. All implementations are safe for concurrent
/// invocation; no call holds adapter-level state between operations.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Persists one entity, assigning the identifier per strategy. Returns
    /// the stored form with the identifier populated.
    async fn insert(&self, desc: &EntityDescriptor, doc: JsonObject) -> Result<Value, AppError>;

    /// Bulk insert of one chunk's worth of entities. Implementations write
    /// the chunk as one storage-level unit where the engine supports it.
    async fn insert_many(
        &self,
        desc: &EntityDescriptor,
        docs: Vec<JsonObject>,
    ) -> Result<Vec<Value>, AppError>;

    async fn find_by_id(&self, desc: &EntityDescriptor, id: &Value)
        -> Result<Option<Value>, AppError>;

    /// Full scan with storage-native ordering; no pagination.
    async fn find_all(
        &self,
        desc: &EntityDescriptor,
        sort: Option<&SortSpec>,
    ) -> Result<Vec<Value>, AppError>;

    /// Storage-level pagination; never materializes the full collection.
    async fn find_page(&self, desc: &EntityDescriptor, req: &PageRequest)
        -> Result<Page, AppError>;

    /// Partial update: only supplied fields change. Returns the stored row,
    /// or None when the identifier does not resolve.
    async fn update(
        &self,
        desc: &EntityDescriptor,
        id: &Value,
        patch: &JsonObject,
    ) -> Result<Option<Value>, AppError>;

    /// Returns true when a row was removed; absence is not an error here.
    async fn delete(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError>;

    async fn count(&self, desc: &EntityDescriptor) -> Result<u64, AppError>;

    async fn exists(&self, desc: &EntityDescriptor, id: &Value) -> Result<bool, AppError>;

    /// Uniqueness probe: does any record match all equality filters,
    /// excluding `exclude_id` when given (update path)?
    async fn exists_matching(
        &self,
        desc: &EntityDescriptor,
        filters: &[(String, Value)],
        exclude_id: Option<&Value>,
    ) -> Result<bool, AppError>;
}
