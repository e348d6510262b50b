//! File-backed entity store.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/checkpoint.json
//! <root>/<Kind>/<0x-id>.json
//! ```
//!
//! Every write goes to a temporary file first and is renamed into place, so a
//! record on disk is always either the old or the new version.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::datasets::entities::{EntityId, EntityKind};
use crate::models::errors::StorageError;
use crate::storage::EntityStore;

const CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    last_processed_block: u64,
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        for kind in EntityKind::ALL {
            fs::create_dir_all(root.join(kind.as_str()))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, kind: EntityKind, id: &EntityId) -> PathBuf {
        self.root
            .join(kind.as_str())
            .join(format!("{}.json", id.to_hex()))
    }

    fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StorageError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl EntityStore for JsonFileStore {
    fn upsert(&self, kind: EntityKind, id: EntityId, record: Value) -> Result<(), StorageError> {
        let path = self.record_path(kind, &id);
        let contents = serde_json::to_vec_pretty(&record)?;
        Self::write_atomic(&path, &contents)?;
        debug!("Wrote {} {} to {}", kind, id, path.display());
        Ok(())
    }

    fn fetch(&self, kind: EntityKind, id: &EntityId) -> Result<Option<Value>, StorageError> {
        Self::read_json(&self.record_path(kind, id))
    }

    fn contains(&self, kind: EntityKind, id: &EntityId) -> Result<bool, StorageError> {
        Ok(self.record_path(kind, id).is_file())
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Value>, StorageError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(self.root.join(kind.as_str()))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        // Fixed-width lowercase hex names sort in id byte order
        paths.sort();

        paths
            .iter()
            .filter_map(|path| Self::read_json::<Value>(path).transpose())
            .collect()
    }

    fn last_processed_block(&self) -> Result<Option<u64>, StorageError> {
        let checkpoint: Option<Checkpoint> = Self::read_json(&self.root.join(CHECKPOINT_FILE))?;
        Ok(checkpoint.map(|c| c.last_processed_block))
    }

    fn set_last_processed_block(&self, block_number: u64) -> Result<(), StorageError> {
        let contents = serde_json::to_vec_pretty(&Checkpoint {
            last_processed_block: block_number,
        })?;
        Self::write_atomic(&self.root.join(CHECKPOINT_FILE), &contents)
    }
}
