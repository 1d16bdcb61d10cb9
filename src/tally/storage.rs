//! Key-value storage backends for the persisted collection.
//!
//! The module runs inside a Web Worker, where `localStorage` does not exist.
//! [`MirroredStorage`] keeps a worker-side copy of the page's localStorage
//! and journals every successful write as a [`StorageOp`]. The page drains
//! the journal through `GET /api/tally/persist` after each request and
//! applies the ops on the main thread; on load it passes the stored value
//! back into `init_tally`. Tests use [`MemoryStorage`] directly, which can
//! be given a byte quota to reproduce `QuotaExceededError`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tally::error::StorageError;

/// Rough localStorage budget per origin (browsers allow about 5 MiB).
pub const LOCAL_STORAGE_QUOTA: usize = 5 * 1024 * 1024;

/// Synchronous, string-valued key-value store.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;

    /// Drain writes the host still has to apply. Backends that write
    /// directly have nothing to hand over.
    fn take_ops(&mut self) -> Vec<StorageOp> {
        Vec::new()
    }
}

/// One write for the main thread to replay against `localStorage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum StorageOp {
    Set { key: String, value: String },
    Remove { key: String },
}

/// In-memory storage with an optional byte quota.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
    /// Maximum total bytes (keys + values). `None` means unlimited.
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: HashMap::new(),
            quota: Some(quota),
        }
    }

    /// Pre-seed a key, bypassing the quota (simulates data left by an earlier session).
    pub fn with_item(mut self, key: &str, value: &str) -> Self {
        self.items.insert(key.to_string(), value.to_string());
        self
    }

    fn used_without(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            if self.used_without(key) + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded(key.to_string()));
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }
}

/// Worker-side mirror of the page's localStorage with a write journal.
#[derive(Debug, Clone)]
pub struct MirroredStorage {
    mirror: MemoryStorage,
    journal: Vec<StorageOp>,
}

impl Default for MirroredStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MirroredStorage {
    pub fn new() -> Self {
        Self {
            mirror: MemoryStorage::with_quota(LOCAL_STORAGE_QUOTA),
            journal: Vec::new(),
        }
    }

    /// Start from the value the page read out of localStorage for `key`.
    pub fn seeded(key: &str, stored: Option<&str>) -> Self {
        let mut storage = Self::new();
        if let Some(value) = stored {
            storage.mirror = storage.mirror.with_item(key, value);
        }
        storage
    }
}

impl KeyValueStorage for MirroredStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.mirror.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mirror.set(key, value)?;
        // Only the latest value of a key matters to the page
        self.journal.retain(|op| !op_targets(op, key));
        self.journal.push(StorageOp::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.mirror.remove(key)?;
        self.journal.retain(|op| !op_targets(op, key));
        self.journal.push(StorageOp::Remove {
            key: key.to_string(),
        });
        Ok(())
    }

    fn take_ops(&mut self) -> Vec<StorageOp> {
        std::mem::take(&mut self.journal)
    }
}

fn op_targets(op: &StorageOp, key: &str) -> bool {
    match op {
        StorageOp::Set { key: k, .. } | StorageOp::Remove { key: k } => k == key,
    }
}
