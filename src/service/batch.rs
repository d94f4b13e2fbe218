//! Chunked batch inserts with partial-failure accounting.
//!
//! The input is processed in submission order, one chunk at a time. A chunk
//! fails as a whole (uniqueness pre-check hit or storage error) and is
//! recorded against its entities; sibling chunks are still attempted.

use crate::descriptor::EntityDescriptor;
use crate::error::AppError;
use crate::service::audit::AuditStamper;
use crate::service::uniqueness::check_conflicts;
use crate::storage::{JsonObject, StorageAdapter};
use crate::telemetry::TelemetrySink;
use serde::Serialize;
use std::time::Instant;

/// One failed chunk: which slice of the submitted input it covered, the
/// entities as submitted, and why it failed. `offset` is the index of the
/// chunk's first entity in the original submission.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub offset: usize,
    pub size: usize,
    pub reason: String,
    /// The failed chunk's entities, in submission order, before stamping.
    pub entities: Vec<JsonObject>,
}

/// Chunks are formed in submission order, so each failure's `offset`/`size`
/// identifies the exact input slice it covers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<ChunkFailure>,
    pub elapsed_ms: u64,
    /// Average wall time per submitted entity, in microseconds.
    pub avg_entity_micros: u64,
}

pub async fn process(
    adapter: &dyn StorageAdapter,
    desc: &EntityDescriptor,
    stamper: &AuditStamper,
    telemetry: &dyn TelemetrySink,
    entities: Vec<JsonObject>,
    chunk_size: usize,
) -> Result<BatchReport, AppError> {
    let chunk_size = chunk_size.max(1);
    let total = entities.len();
    let started = Instant::now();

    let mut succeeded = 0usize;
    let mut failures: Vec<ChunkFailure> = Vec::new();
    let mut processed = 0usize;

    let mut offset = 0usize;
    let mut chunk_index = 0usize;
    let mut remaining = entities;
    while !remaining.is_empty() {
        let rest = remaining.split_off(chunk_size.min(remaining.len()));
        let chunk = std::mem::replace(&mut remaining, rest);
        let size = chunk.len();

        match insert_chunk(adapter, desc, stamper, &chunk).await {
            Ok(()) => succeeded += size,
            Err(e) => {
                tracing::warn!(
                    entity = %desc.name,
                    chunk_index,
                    size,
                    error = %e,
                    "batch chunk failed"
                );
                failures.push(ChunkFailure {
                    chunk_index,
                    offset,
                    size,
                    reason: e.to_string(),
                    entities: chunk,
                });
            }
        }

        processed += size;
        telemetry.batch_progress(&desc.name, chunk_index, size, processed, total);
        offset += size;
        chunk_index += 1;
    }

    let elapsed = started.elapsed();
    let failed = failures.iter().map(|f| f.size).sum();
    Ok(BatchReport {
        total,
        succeeded,
        failed,
        failures,
        elapsed_ms: elapsed.as_millis() as u64,
        avg_entity_micros: if total == 0 {
            0
        } else {
            (elapsed.as_micros() / total as u128) as u64
        },
    })
}

/// One chunk: stamp, pre-check uniqueness per entity, bulk insert. Any
/// failure aborts this chunk only.
async fn insert_chunk(
    adapter: &dyn StorageAdapter,
    desc: &EntityDescriptor,
    stamper: &AuditStamper,
    chunk: &[JsonObject],
) -> Result<(), AppError> {
    let mut stamped = Vec::with_capacity(chunk.len());
    for doc in chunk {
        let mut doc = doc.clone();
        doc.remove(&desc.id_field);
        stamper.stamp_create(desc, &mut doc);
        let conflicts = check_conflicts(adapter, desc, &doc, None).await?;
        if !conflicts.is_empty() {
            return Err(AppError::UniqueViolation(conflicts));
        }
        stamped.push(doc);
    }
    adapter.insert_many(desc, stamped).await?;
    Ok(())
}
