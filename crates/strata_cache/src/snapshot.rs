//! Delta between two consecutive cache states, for exporters.

use strata_common::ContentHash;

use crate::entry::{BuildCacheEntry, SerializedBuildCache, STATE_KEY};
use crate::error::CacheError;
use crate::store::CacheStore;

/// Read-only view of what changed in the last saved build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Entries tagged new in the current state, ordered by path.
    pub added: Vec<BuildCacheEntry>,
    /// Previous entries whose path is absent from the current state, ordered by path.
    pub evicted: Vec<BuildCacheEntry>,
    /// Every current entry, ordered by path.
    pub current: Vec<BuildCacheEntry>,
}

impl Snapshot {
    /// Loads the saved state from `store` and derives the snapshot.
    ///
    /// A missing state yields an empty snapshot. Unlike
    /// [`BuildCache::load`](crate::BuildCache::load), an unreadable state is an
    /// error: exporters must not publish or delete from a corrupt baseline.
    pub async fn load<S: CacheStore + ?Sized>(store: &S) -> Result<Self, CacheError> {
        match store.get(STATE_KEY).await? {
            Some(bytes) => Ok(Self::from_state(&SerializedBuildCache::from_json(&bytes)?)),
            None => Ok(Self::default()),
        }
    }

    /// Derives the snapshot from a state without side effects.
    pub fn from_state(state: &SerializedBuildCache) -> Self {
        let added = state
            .current
            .values()
            .filter(|e| e.is_new())
            .cloned()
            .collect();
        let evicted = state
            .previous
            .iter()
            .filter(|(path, _)| !state.current.contains_key(*path))
            .map(|(_, e)| e.clone())
            .collect();
        let current = state.current.values().cloned().collect();
        Self {
            added,
            evicted,
            current,
        }
    }

    /// Paths of the added entries.
    pub fn added_paths(&self) -> Vec<&str> {
        self.added.iter().map(|e| e.path.as_str()).collect()
    }

    /// Paths of the evicted entries.
    pub fn evicted_paths(&self) -> Vec<&str> {
        self.evicted.iter().map(|e| e.path.as_str()).collect()
    }

    /// Returns `true` if nothing was added or evicted.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.evicted.is_empty()
    }

    /// Looks up a current entry by path.
    pub fn get(&self, path: &str) -> Option<&BuildCacheEntry> {
        self.current
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.current[i])
    }

    /// Returns `true` if `path` is current with `hash`.
    pub fn contains(&self, path: &str, hash: &ContentHash) -> bool {
        self.get(path).is_some_and(|e| e.hash == *hash)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::cache::BuildCache;
    use crate::entry::{Age, GenerationResult};
    use crate::store::MemoryStore;

    fn entry(path: &str, hash: &str, age: Age) -> BuildCacheEntry {
        BuildCacheEntry {
            path: path.to_string(),
            hash: ContentHash::from_bytes(hash.as_bytes()),
            document_path: None,
            headers: Vec::new(),
            status: None,
            age,
        }
    }

    fn map(entries: Vec<BuildCacheEntry>) -> BTreeMap<String, BuildCacheEntry> {
        entries.into_iter().map(|e| (e.path.clone(), e)).collect()
    }

    #[test]
    fn diff_classifies_added_and_evicted() {
        let state = SerializedBuildCache {
            previous: map(vec![entry("A", "1", Age::New), entry("B", "2", Age::New)]),
            current: map(vec![entry("A", "1", Age::New), entry("C", "3", Age::New)]),
        };
        let snapshot = Snapshot::from_state(&state);
        assert_eq!(snapshot.added_paths(), vec!["A", "C"]);
        assert_eq!(snapshot.evicted_paths(), vec!["B"]);
        assert_eq!(snapshot.current.len(), 2);
        assert!(!snapshot.is_unchanged());
    }

    #[test]
    fn old_entries_are_not_added() {
        let state = SerializedBuildCache {
            previous: map(vec![entry("A", "1", Age::New)]),
            current: map(vec![entry("A", "1", Age::Old)]),
        };
        let snapshot = Snapshot::from_state(&state);
        assert!(snapshot.is_unchanged());
        assert!(snapshot.contains("A", &ContentHash::from_bytes(b"1")));
        assert!(!snapshot.contains("A", &ContentHash::from_bytes(b"2")));
        assert!(snapshot.get("Z").is_none());
    }

    #[tokio::test]
    async fn missing_state_is_empty_snapshot() {
        let snapshot = Snapshot::load(&MemoryStore::new()).await.unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[tokio::test]
    async fn corrupt_state_is_an_error() {
        let store = MemoryStore::new();
        store.seed(STATE_KEY, "not json");
        let err = Snapshot::load(&store).await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn snapshot_after_two_builds() {
        let store = MemoryStore::new();
        let first = BuildCache::load(&store).await;
        for (path, body) in [("/a", "a"), ("/b", "b")] {
            first
                .add(GenerationResult::new(path, ContentHash::from_bytes(body.as_bytes())))
                .await
                .unwrap();
        }
        first.save().await.unwrap();

        let second = BuildCache::load(&store).await;
        for (path, body) in [("/a", "a"), ("/c", "c")] {
            second
                .add(GenerationResult::new(path, ContentHash::from_bytes(body.as_bytes())))
                .await
                .unwrap();
        }
        second.save().await.unwrap();

        let snapshot = Snapshot::load(&store).await.unwrap();
        assert_eq!(snapshot.added_paths(), vec!["/c"]);
        assert_eq!(snapshot.evicted_paths(), vec!["/b"]);
        assert_eq!(
            snapshot.current.iter().map(|e| e.path.as_str()).collect::<Vec<_>>(),
            vec!["/a", "/c"]
        );
    }
}
