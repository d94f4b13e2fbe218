//! Entity registration: descriptors resolved at startup, wired to the
//! storage backend their id strategy requires, and exposed as a read-only
//! lookup of engines. Registration fails fast; the registry never changes
//! after [`RegistryBuilder::build`].

use crate::descriptor::{EntityDefinition, EntityDescriptor, IdKind};
use crate::error::ConfigError;
use crate::service::{ActorResolver, AuditStamper, CrudEngine};
use crate::storage::{DocumentAdapter, IdentityAdapter, SequenceAdapter, StorageAdapter};
use crate::telemetry::{LogSink, TelemetrySink};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Connected backends available to the builder. Any subset may be present;
/// registering an entity whose strategy needs an absent backend is a
/// configuration error.
#[derive(Clone, Default)]
pub struct StorageBackends {
    pub mongo: Option<mongodb::Database>,
    pub postgres: Option<sqlx::PgPool>,
    pub mysql: Option<sqlx::MySqlPool>,
}

pub struct RegistryBuilder {
    backends: StorageBackends,
    telemetry: Arc<dyn TelemetrySink>,
    actor: Option<ActorResolver>,
    chunk_size: usize,
    engines: BTreeMap<String, Arc<CrudEngine>>,
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("chunk_size", &self.chunk_size)
            .field("entities", &self.engines.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl RegistryBuilder {
    pub fn new(backends: StorageBackends) -> Self {
        RegistryBuilder {
            backends,
            telemetry: Arc::new(LogSink),
            actor: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            engines: BTreeMap::new(),
        }
    }

    pub fn telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    pub fn actor_resolver(mut self, actor: ActorResolver) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Batch chunk size for every registered entity. Clamped to at least 1.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Resolves the definition and wires it to the backend its id strategy
    /// selects.
    pub fn register(mut self, def: EntityDefinition) -> Result<Self, ConfigError> {
        let desc = EntityDescriptor::resolve(def)?;
        let adapter: Arc<dyn StorageAdapter> = match desc.id_kind {
            IdKind::DocumentString => {
                let db = self.backends.mongo.clone().ok_or(ConfigError::MissingBackend {
                    entity: desc.name.clone(),
                    backend: "document store",
                })?;
                Arc::new(DocumentAdapter::new(db))
            }
            IdKind::SequenceLong => {
                let pool = self
                    .backends
                    .postgres
                    .clone()
                    .ok_or(ConfigError::MissingBackend {
                        entity: desc.name.clone(),
                        backend: "postgres",
                    })?;
                Arc::new(SequenceAdapter::new(pool))
            }
            IdKind::IdentityLong => {
                let pool = self
                    .backends
                    .mysql
                    .clone()
                    .ok_or(ConfigError::MissingBackend {
                        entity: desc.name.clone(),
                        backend: "mysql",
                    })?;
                Arc::new(IdentityAdapter::new(pool))
            }
        };
        self.insert(desc, adapter)?;
        Ok(self)
    }

    /// Registers with an explicit adapter, bypassing backend selection.
    /// Used by embedders bringing their own storage and by tests.
    pub fn register_with_adapter(
        mut self,
        def: EntityDefinition,
        adapter: Arc<dyn StorageAdapter>,
    ) -> Result<Self, ConfigError> {
        let desc = EntityDescriptor::resolve(def)?;
        self.insert(desc, adapter)?;
        Ok(self)
    }

    fn insert(
        &mut self,
        desc: EntityDescriptor,
        adapter: Arc<dyn StorageAdapter>,
    ) -> Result<(), ConfigError> {
        if self.engines.contains_key(&desc.name) {
            return Err(ConfigError::Invalid {
                entity: desc.name,
                message: "entity registered twice".into(),
            });
        }
        let stamper = match &self.actor {
            Some(actor) => AuditStamper::with_actor(actor.clone()),
            None => AuditStamper::new(),
        };
        let engine = CrudEngine::new(
            Arc::new(desc.clone()),
            adapter,
            stamper,
            self.telemetry.clone(),
            self.chunk_size,
        );
        tracing::info!(entity = %desc.name, id_kind = ?desc.id_kind, "entity registered");
        self.engines.insert(desc.name, Arc::new(engine));
        Ok(())
    }

    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            engines: self.engines,
        }
    }
}

/// Immutable name-to-engine lookup shared across request handlers.
pub struct ServiceRegistry {
    engines: BTreeMap<String, Arc<CrudEngine>>,
}

impl ServiceRegistry {
    pub fn engine(&self, entity: &str) -> Option<&Arc<CrudEngine>> {
        self.engines.get(entity)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
