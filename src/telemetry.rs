//! Telemetry sink: batch progress and per-operation timing observations.

use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber, honoring `RUST_LOG`. Call once
/// from the binary before serving.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

/// Collaborator receiving progress and timing observations from the engine.
/// Implementations must not block; observations are fire-and-forget.
pub trait TelemetrySink: Send + Sync {
    /// One observation per processed batch chunk.
    fn batch_progress(
        &self,
        entity: &str,
        chunk_index: usize,
        chunk_size: usize,
        processed: usize,
        total: usize,
    );

    /// One observation per engine operation.
    fn operation_timing(&self, entity: &str, operation: &str, elapsed: Duration);
}

/// Default sink: structured log events.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn batch_progress(
        &self,
        entity: &str,
        chunk_index: usize,
        chunk_size: usize,
        processed: usize,
        total: usize,
    ) {
        tracing::info!(
            entity,
            chunk_index,
            chunk_size,
            processed,
            total,
            "batch chunk processed"
        );
    }

    fn operation_timing(&self, entity: &str, operation: &str, elapsed: Duration) {
        tracing::debug!(entity, operation, elapsed_us = elapsed.as_micros() as u64, "operation timing");
    }
}
