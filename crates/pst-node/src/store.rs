//! Keyed entity store with LRU eviction.
//!
//! Entries live in memory until more than `max_entries` are loaded; the least
//! recently used entry is then moved to a spill area and brought back on the
//! next `get`. `loaded_keys` only reports what is in memory, which is what the
//! "update a bicycle that is not loaded" flow keys off.
//!
//! The spill area is in-memory as well; it stands in for a cache loader and
//! makes no durability promise.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::num::NonZeroUsize;
use tracing::debug;

/// Loaded value with its last access stamp
#[derive(Clone, Debug)]
struct LoadedEntry<E> {
    value: E,
    last_access: u64,
}

/// A keyed store of entities.
#[derive(Clone, Debug)]
pub struct EntityStore<E> {
    loaded: HashMap<String, LoadedEntry<E>>,
    spilled: HashMap<String, E>,
    max_entries: Option<NonZeroUsize>,
    clock: u64,
}

impl<E: Clone> EntityStore<E> {
    /// Create a store; `None` or zero keeps everything loaded
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            loaded: HashMap::new(),
            spilled: HashMap::new(),
            max_entries: max_entries.and_then(NonZeroUsize::new),
            clock: 0,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Fetch a copy of an entry, loading it back if it was evicted
    pub fn get(&mut self, key: &str) -> Option<E> {
        let stamp = self.tick();
        if let Some(entry) = self.loaded.get_mut(key) {
            entry.last_access = stamp;
            return Some(entry.value.clone());
        }

        let value = self.spilled.remove(key)?;
        debug!(key, "reloading evicted entry");
        self.loaded.insert(
            key.to_string(),
            LoadedEntry {
                value: value.clone(),
                last_access: stamp,
            },
        );
        self.evict_overflow();
        Some(value)
    }

    /// Insert or replace an entry
    pub fn put(&mut self, key: impl Into<String>, value: E) {
        let key = key.into();
        let stamp = self.tick();
        self.spilled.remove(&key);
        self.loaded.insert(
            key,
            LoadedEntry {
                value,
                last_access: stamp,
            },
        );
        self.evict_overflow();
    }

    pub fn remove(&mut self, key: &str) -> Option<E> {
        self.loaded
            .remove(key)
            .map(|entry| entry.value)
            .or_else(|| self.spilled.remove(key))
    }

    /// Whether the key exists, loaded or evicted
    pub fn contains_key(&self, key: &str) -> bool {
        self.loaded.contains_key(key) || self.spilled.contains_key(key)
    }

    /// Keys currently held in memory
    pub fn loaded_keys(&self) -> BTreeSet<String> {
        self.loaded.keys().cloned().collect()
    }

    /// Every key, loaded or evicted
    pub fn keys(&self) -> BTreeSet<String> {
        self.loaded
            .keys()
            .chain(self.spilled.keys())
            .cloned()
            .collect()
    }

    /// Every entry sorted by key, without touching recency
    pub fn entries(&self) -> Vec<(String, E)> {
        let all: BTreeMap<_, _> = self
            .loaded
            .iter()
            .map(|(k, entry)| (k.clone(), entry.value.clone()))
            .chain(self.spilled.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect();
        all.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.loaded.len() + self.spilled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            loaded: self.loaded.len(),
            spilled: self.spilled.len(),
            capacity: self.max_entries.map(NonZeroUsize::get),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_overflow(&mut self) {
        let Some(max) = self.max_entries else {
            return;
        };
        while self.loaded.len() > max.get() {
            let Some(victim) = self
                .loaded
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            if let Some(entry) = self.loaded.remove(&victim) {
                debug!(key = %victim, "evicting least recently used entry");
                self.spilled.insert(victim, entry.value);
            }
        }
    }
}

impl<E: Clone> Default for EntityStore<E> {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Store statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Entries held in memory
    pub loaded: usize,
    /// Entries evicted to the spill area
    pub spilled: usize,
    /// In-memory limit, `None` when eviction is off
    pub capacity: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_keeps_everything_loaded() {
        let mut store = EntityStore::unbounded();
        store.put("a", 1);
        store.put("b", 2);
        store.put("c", 3);

        assert_eq!(store.loaded_keys().len(), 3);
        assert_eq!(store.get("b"), Some(2));
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut store = EntityStore::new(Some(1));
        store.put("a", 1);
        store.put("b", 2);

        assert_eq!(store.loaded_keys(), BTreeSet::from(["b".to_string()]));
        assert_eq!(store.keys().len(), 2);
        assert!(store.contains_key("a"));
    }

    #[test]
    fn test_get_reloads_evicted_entry() {
        let mut store = EntityStore::new(Some(1));
        store.put("a", 1);
        store.put("b", 2);

        assert_eq!(store.get("a"), Some(1));
        assert_eq!(store.loaded_keys(), BTreeSet::from(["a".to_string()]));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut store = EntityStore::new(Some(2));
        store.put("a", 1);
        store.put("b", 2);
        store.get("a");
        store.put("c", 3);

        // "b" was least recently used
        assert_eq!(
            store.loaded_keys(),
            BTreeSet::from(["a".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_put_replaces_evicted_value() {
        let mut store = EntityStore::new(Some(1));
        store.put("a", 1);
        store.put("b", 2);
        store.put("a", 10);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a"), Some(10));
    }

    #[test]
    fn test_remove_from_either_area() {
        let mut store = EntityStore::new(Some(1));
        store.put("a", 1);
        store.put("b", 2);

        assert_eq!(store.remove("a"), Some(1));
        assert_eq!(store.remove("b"), Some(2));
        assert_eq!(store.remove("c"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_entries_sorted() {
        let mut store = EntityStore::new(Some(1));
        store.put("c", 3);
        store.put("a", 1);
        store.put("b", 2);

        let keys: Vec<_> = store.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_stats_track_both_areas() {
        let mut store = EntityStore::new(Some(2));
        store.put("a", 1);
        store.put("b", 2);
        store.put("c", 3);

        assert_eq!(
            store.stats(),
            StoreStats {
                loaded: 2,
                spilled: 1,
                capacity: Some(2)
            }
        );
        assert_eq!(EntityStore::<u8>::new(Some(0)).stats().capacity, None);
    }

    #[test]
    fn test_missing_key() {
        let mut store: EntityStore<u8> = EntityStore::new(Some(1));
        assert_eq!(store.get("nope"), None);
        assert!(!store.contains_key("nope"));
    }
}
