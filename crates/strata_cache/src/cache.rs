//! The incremental build cache.
//!
//! A `BuildCache` is seeded from the state the previous run saved and
//! populated with this run's generation results. Results whose hash matches
//! the previous entry for the same path are carried over without touching
//! the store; everything else has its body written and is tagged new.
//!
//! Loading is fail-safe: a missing or unreadable state yields an empty
//! previous map, which means every output is rebuilt.

use std::collections::{BTreeMap, HashSet};

use strata_common::ContentHash;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::document::{decode_document, document_key, encode_document, DOCUMENTS_PREFIX};
use crate::entry::{Age, BuildCacheEntry, GenerationResult, SerializedBuildCache, STATE_KEY};
use crate::error::CacheError;
use crate::store::CacheStore;

/// Build cache over an injected [`CacheStore`].
///
/// `add` takes `&self` and may be called concurrently for distinct output
/// paths. The current map has a single writer at a time; document bodies are
/// written outside the lock.
pub struct BuildCache<S> {
    store: S,
    previous: BTreeMap<String, BuildCacheEntry>,
    current: Mutex<BTreeMap<String, BuildCacheEntry>>,
}

impl<S: CacheStore> BuildCache<S> {
    /// Loads the previous run's state from `store`.
    ///
    /// The saved `current` map becomes this run's `previous`. Never fails.
    pub async fn load(store: S) -> Self {
        let previous = match store.get(STATE_KEY).await {
            Ok(None) => {
                debug!(key = STATE_KEY, "no previous build cache, starting empty");
                BTreeMap::new()
            }
            Ok(Some(bytes)) => match SerializedBuildCache::from_json(&bytes) {
                Ok(state) => state.current,
                Err(err) => {
                    warn!(error = %err, "ignoring unreadable build cache, rebuilding everything");
                    BTreeMap::new()
                }
            },
            Err(err) => {
                warn!(error = %err, "could not read build cache, rebuilding everything");
                BTreeMap::new()
            }
        };
        debug!(entries = previous.len(), "loaded build cache");
        Self::with_previous(store, previous)
    }

    /// Creates a cache with an explicit previous map, bypassing the store.
    pub fn with_previous(store: S, previous: BTreeMap<String, BuildCacheEntry>) -> Self {
        Self {
            store,
            previous,
            current: Mutex::new(BTreeMap::new()),
        }
    }

    /// Records one generation result and returns its age.
    ///
    /// If the previous run produced the same path with the same hash, its
    /// entry is carried over tagged [`Age::Old`] and nothing is written.
    /// Otherwise the body, if any, is stored and the entry is tagged
    /// [`Age::New`]. A second result for the same path replaces the first.
    pub async fn add(&self, result: GenerationResult) -> Result<Age, CacheError> {
        if let Some(previous) = self.previous.get(&result.path) {
            if previous.hash == result.hash {
                let entry = BuildCacheEntry {
                    age: Age::Old,
                    ..previous.clone()
                };
                self.current.lock().await.insert(result.path, entry);
                return Ok(Age::Old);
            }
        }

        let document_path = match &result.body {
            Some(body) => {
                let key = document_key(&result.path, &result.hash);
                self.store.put(&key, encode_document(body)?).await?;
                Some(key)
            }
            None => None,
        };

        debug!(path = %result.path, hash = %result.hash, "cached new output");
        let entry = BuildCacheEntry {
            path: result.path.clone(),
            hash: result.hash,
            document_path,
            headers: result.headers,
            status: result.status,
            age: Age::New,
        };
        self.current.lock().await.insert(result.path, entry);
        Ok(Age::New)
    }

    /// Returns the previous run's entry for `path`.
    pub fn previous_entry(&self, path: &str) -> Option<&BuildCacheEntry> {
        self.previous.get(path)
    }

    /// Returns `true` if the previous run produced `path` with `hash`.
    ///
    /// Lets the page layer skip regeneration before calling [`add`](Self::add).
    pub fn is_fresh(&self, path: &str, hash: &ContentHash) -> bool {
        self.previous_entry(path).is_some_and(|e| e.hash == *hash)
    }

    /// Returns the previous run's entries.
    pub fn previous(&self) -> &BTreeMap<String, BuildCacheEntry> {
        &self.previous
    }

    /// Returns a copy of this run's entries so far.
    pub async fn current(&self) -> BTreeMap<String, BuildCacheEntry> {
        self.current.lock().await.clone()
    }

    /// Returns the state [`save`](Self::save) would persist.
    pub async fn state(&self) -> SerializedBuildCache {
        SerializedBuildCache {
            current: self.current().await,
            previous: self.previous.clone(),
        }
    }

    /// Atomically persists `{current, previous}` to the store.
    pub async fn save(&self) -> Result<(), CacheError> {
        let state = self.state().await;
        let bytes = state.to_json()?;
        self.store.put(STATE_KEY, bytes).await?;
        let added = state.current.values().filter(|e| e.is_new()).count();
        info!(
            entries = state.current.len(),
            added,
            reused = state.current.len() - added,
            "saved build cache"
        );
        Ok(())
    }

    /// Removes stored documents not referenced by the current entries.
    ///
    /// Returns the number of documents removed.
    pub async fn collect_garbage(&self) -> Result<usize, CacheError> {
        let live: HashSet<String> = self
            .current
            .lock()
            .await
            .values()
            .filter_map(|e| e.document_path.clone())
            .collect();

        let mut removed = 0;
        for key in self.store.keys(DOCUMENTS_PREFIX).await? {
            if !live.contains(&key) && self.store.delete(&key).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "collected stale documents");
        }
        Ok(removed)
    }

    /// Reads and validates the body of `entry`.
    ///
    /// Returns `None` if the entry has no body or the stored document is
    /// missing or fails validation.
    pub async fn read_document(&self, entry: &BuildCacheEntry) -> Result<Option<Vec<u8>>, CacheError> {
        let Some(key) = &entry.document_path else {
            return Ok(None);
        };
        let raw = self.store.get(key).await?;
        Ok(raw.and_then(|bytes| decode_document(&bytes)))
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}
