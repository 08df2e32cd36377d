//! Durable key-value storage used to remember per-source view state

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::Result;

/// Key-value storage that survives navigation between data sources.
///
/// Values are opaque strings; callers serialize whatever they store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        tracing::trace!(key = %key, "storing value");
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
