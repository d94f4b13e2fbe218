//! The generic CRUD service engine and its collaborators.

pub mod audit;
pub mod batch;
pub mod engine;
pub mod uniqueness;

pub use audit::{ActorResolver, AuditStamper};
pub use batch::{BatchReport, ChunkFailure};
pub use engine::CrudEngine;
pub use uniqueness::check_conflicts;
