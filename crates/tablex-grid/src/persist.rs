//! Best-effort persistence of per-source view state

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tablex_core::KeyValueStore;

/// Storage key for the persisted page index of a data source
pub fn pagination_key(source_identity: &str) -> String {
    format!("{}_pagination_state", source_identity)
}

/// Storage key for the persisted scroll offset of a data source
pub fn scroll_anchor_key(source_identity: &str) -> String {
    format!("{}_scroll_anchor", source_identity)
}

/// Storage key for the global page size preference
pub const PAGE_SIZE_KEY: &str = "page_size";

/// Wraps an optional [`KeyValueStore`].
///
/// The first failed read or write logs a warning and turns every later call into a
/// no-op, so the view keeps working from in-memory state for the rest of the session.
/// Clones share the degraded flag.
#[derive(Clone, Default)]
pub struct Persistence {
    store: Option<Arc<dyn KeyValueStore>>,
    degraded: Arc<AtomicBool>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store: Some(store),
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Persistence that never stores anything
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn active_store(&self) -> Option<&Arc<dyn KeyValueStore>> {
        if self.is_degraded() {
            return None;
        }
        self.store.as_ref()
    }

    pub fn load(&self, key: &str) -> Option<String> {
        let store = self.active_store()?;
        match store.get(key) {
            Ok(value) => value,
            Err(e) => {
                self.degrade(key, &e);
                None
            }
        }
    }

    /// Load and parse a value; unparsable values are treated as absent
    pub fn load_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.load(key).and_then(|raw| raw.trim().parse().ok())
    }

    pub fn save(&self, key: &str, value: &str) {
        let Some(store) = self.active_store() else {
            return;
        };
        if let Err(e) = store.set(key, value) {
            self.degrade(key, &e);
        }
    }

    fn degrade(&self, key: &str, error: &tablex_core::TablexError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                key = %key,
                error = %error,
                "persistent storage failed, keeping view state in memory for this session"
            );
        }
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("has_store", &self.store.is_some())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablex_core::{MemoryKeyValueStore, Result, TablexError};

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(TablexError::Storage("disk full".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(TablexError::Storage("disk full".into()))
        }
    }

    #[test]
    fn test_keys() {
        assert_eq!(pagination_key("conn-1"), "conn-1_pagination_state");
        assert_eq!(scroll_anchor_key("conn-1"), "conn-1_scroll_anchor");
    }

    #[test]
    fn test_round_trip_through_store() {
        let persistence = Persistence::new(Arc::new(MemoryKeyValueStore::new()));
        persistence.save("n", "42");
        assert_eq!(persistence.load_parsed::<usize>("n"), Some(42));
        assert_eq!(persistence.load_parsed::<usize>("missing"), None);
    }

    #[test]
    fn test_failure_degrades_to_memory_only() {
        let persistence = Persistence::new(Arc::new(FailingStore));
        let clone = persistence.clone();

        persistence.save("n", "1");
        assert!(persistence.is_degraded());
        assert!(clone.is_degraded());
        assert_eq!(clone.load("n"), None);
    }

    #[test]
    fn test_disabled_is_silent() {
        let persistence = Persistence::disabled();
        persistence.save("n", "1");
        assert_eq!(persistence.load("n"), None);
        assert!(!persistence.is_degraded());
    }
}
