//! In-memory entity store. Used by tests and short-lived runs that don't need persistence.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::models::datasets::entities::{EntityId, EntityKind};
use crate::models::errors::StorageError;
use crate::storage::EntityStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<EntityKind, BTreeMap<EntityId, Value>>>,
    checkpoint: Mutex<Option<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored for a kind.
    pub fn count(&self, kind: EntityKind) -> Result<usize, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.get(&kind).map_or(0, BTreeMap::len))
    }
}

impl EntityStore for MemoryStore {
    fn upsert(&self, kind: EntityKind, id: EntityId, record: Value) -> Result<(), StorageError> {
        let mut records = self.records.lock().map_err(|_| StorageError::LockPoisoned)?;
        records.entry(kind).or_default().insert(id, record);
        Ok(())
    }

    fn fetch(&self, kind: EntityKind, id: &EntityId) -> Result<Option<Value>, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.get(&kind).and_then(|by_id| by_id.get(id)).cloned())
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Value>, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records
            .get(&kind)
            .map(|by_id| by_id.values().cloned().collect())
            .unwrap_or_default())
    }

    fn last_processed_block(&self) -> Result<Option<u64>, StorageError> {
        let checkpoint = self.checkpoint.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(*checkpoint)
    }

    fn set_last_processed_block(&self, block_number: u64) -> Result<(), StorageError> {
        let mut checkpoint = self.checkpoint.lock().map_err(|_| StorageError::LockPoisoned)?;
        *checkpoint = Some(block_number);
        Ok(())
    }
}
