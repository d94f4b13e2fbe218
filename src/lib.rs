//! Crudcraft: convention-driven CRUD scaffolding over document and
//! relational storage.
//!
//! Entities are declared as [`descriptor::EntityDefinition`] values,
//! resolved and registered once at startup, and served through a generic
//! engine that handles audit stamping, declarative uniqueness, chunked
//! batch inserts, and pagination uniformly across MongoDB, PostgreSQL and
//! MySQL backends.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod handlers;
pub mod page;
pub mod registry;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod storage;
pub mod telemetry;

pub use descriptor::{EntityDefinition, EntityDescriptor, IdKind};
pub use error::{AppError, ConfigError, ConflictDescription};
pub use page::{Page, PageRequest, SortDirection, SortSpec};
pub use registry::{RegistryBuilder, ServiceRegistry, StorageBackends};
pub use response::ApiResponse;
pub use routes::{app_router, common_routes, entity_routes};
pub use config::{load_definitions, RuntimeConfig};
pub use service::{AuditStamper, BatchReport, ChunkFailure, CrudEngine};
pub use state::{AppState, PageDefaults};
pub use storage::{DocumentAdapter, IdentityAdapter, MemoryAdapter, SequenceAdapter, StorageAdapter};
pub use telemetry::{init_tracing, LogSink, TelemetrySink};
