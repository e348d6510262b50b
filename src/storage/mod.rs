pub mod json;
pub mod memory;
pub mod query;

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::models::common::{StorageBackend, StorageConfig};
use crate::models::datasets::entities::{Entity, EntityId, EntityKind};
use crate::models::errors::{ConfigError, StorageError};

/// Keyed record store the event mapper writes into.
///
/// Records are addressed by `(kind, id)`; every kind is its own namespace.
/// Consistency between concurrent writers is left to the backend.
pub trait EntityStore: Send + Sync {
    /// Insert or replace the record stored under `(kind, id)`.
    fn upsert(&self, kind: EntityKind, id: EntityId, record: Value) -> Result<(), StorageError>;

    fn fetch(&self, kind: EntityKind, id: &EntityId) -> Result<Option<Value>, StorageError>;

    fn contains(&self, kind: EntityKind, id: &EntityId) -> Result<bool, StorageError> {
        Ok(self.fetch(kind, id)?.is_some())
    }

    /// All records of a kind, ordered by id.
    fn scan(&self, kind: EntityKind) -> Result<Vec<Value>, StorageError>;

    fn last_processed_block(&self) -> Result<Option<u64>, StorageError>;

    fn set_last_processed_block(&self, block_number: u64) -> Result<(), StorageError>;
}

pub fn save<E: Entity>(store: &dyn EntityStore, entity: &E) -> Result<(), StorageError> {
    let record = serde_json::to_value(entity)?;
    store.upsert(E::KIND, entity.id(), record)
}

pub fn load<E: Entity>(store: &dyn EntityStore, id: &EntityId) -> Result<Option<E>, StorageError> {
    store
        .fetch(E::KIND, id)?
        .map(|record| serde_json::from_value(record).map_err(StorageError::from))
        .transpose()
}

pub fn load_all<E: Entity>(store: &dyn EntityStore) -> Result<Vec<E>, StorageError> {
    store
        .scan(E::KIND)?
        .into_iter()
        .map(|record| serde_json::from_value(record).map_err(StorageError::from))
        .collect()
}

pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn EntityStore>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory entity store (nothing is persisted across restarts)");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
        StorageBackend::Json => {
            let path = config.path.as_ref().ok_or(ConfigError::MissingStoragePath)?;
            info!("Using JSON file entity store at {}", path.display());
            Ok(Arc::new(json::JsonFileStore::open(path)?))
        }
    }
}
