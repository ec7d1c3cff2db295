//! Local durable key/value storage.
//!
//! The mirror, the tournament id and the pending-write queue all live in a
//! flat string namespace (`bakken-*`). Storage is synchronous and assumed to
//! be always available; implementations log their own failures.

mod file;

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

pub use file::FileStore;

pub const TOURNAMENT_ID_KEY: &str = "bakken-tournament-id";
pub const PENDING_SYNC_KEY: &str = "bakken-pending-sync";

/// Synchronous string-keyed storage.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Process-local store (tests and ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored entry.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(TOURNAMENT_ID_KEY), None);

        store.set(TOURNAMENT_ID_KEY, "t-1");
        assert_eq!(store.get(TOURNAMENT_ID_KEY).as_deref(), Some("t-1"));

        store.set(TOURNAMENT_ID_KEY, "t-2");
        assert_eq!(store.get(TOURNAMENT_ID_KEY).as_deref(), Some("t-2"));

        store.remove(TOURNAMENT_ID_KEY);
        assert_eq!(store.get(TOURNAMENT_ID_KEY), None);
        assert!(store.entries().is_empty());
    }
}
