//! Key-value persistence boundary for the build cache.
//!
//! The cache never touches the filesystem directly. It reads and writes
//! through a [`CacheStore`], so the cache of record is whatever store the
//! embedder injects.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};

use crate::error::CacheError;

/// A durable key-value store.
///
/// Keys are `/`-separated relative paths. `put` must replace the value
/// atomically: readers observe either the old or the new value, never a mix.
pub trait CacheStore: Send + Sync {
    /// Reads a value, returning `None` if the key does not exist.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>>;

    /// Atomically writes a value.
    fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<(), CacheError>>;

    /// Removes a key, returning whether it existed.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, CacheError>>;

    /// Lists all keys starting with `prefix`, sorted.
    fn keys<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, CacheError>>;
}

impl<T: CacheStore + ?Sized> CacheStore for &T {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
        (**self).get(key)
    }

    fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<(), CacheError>> {
        (**self).put(key, value)
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, CacheError>> {
        (**self).delete(key)
    }

    fn keys<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, CacheError>> {
        (**self).keys(prefix)
    }
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
        (**self).get(key)
    }

    fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<(), CacheError>> {
        (**self).put(key, value)
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, CacheError>> {
        (**self).delete(key)
    }

    fn keys<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, CacheError>> {
        (**self).keys(prefix)
    }
}

/// Suffix of in-progress writes; such files are never listed as keys.
const TEMP_SUFFIX: &str = ".tmp";

/// Distinguishes concurrent writers to the same key.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A [`CacheStore`] rooted at a directory.
///
/// Each key maps to a file under the root. Writes go to a temporary sibling
/// file which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key to its file path, rejecting keys that escape the root.
    pub fn key_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(CacheError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    async fn write_atomic(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| CacheError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let mut temp = path.clone().into_os_string();
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        temp.push(format!(".{}.{n}{TEMP_SUFFIX}", std::process::id()));
        let temp = PathBuf::from(temp);
        tokio::fs::write(&temp, &value).await.map_err(|e| CacheError::Io {
            path: temp.clone(),
            source: e,
        })?;
        tokio::fs::rename(&temp, &path).await.map_err(|e| CacheError::Io { path, source: e })
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.key_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CacheError::Io { path: dir, source: e }),
            };
            loop {
                let entry = entries.next_entry().await.map_err(|e| CacheError::Io {
                    path: dir.clone(),
                    source: e,
                })?;
                let Some(entry) = entry else { break };
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| CacheError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) && !key.ends_with(TEMP_SUFFIX) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl CacheStore for FsStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
        self.read(key).boxed()
    }

    fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<(), CacheError>> {
        self.write_atomic(key, value).boxed()
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, CacheError>> {
        self.remove(key).boxed()
    }

    fn keys<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, CacheError>> {
        self.list(prefix).boxed()
    }
}

/// An in-memory [`CacheStore`].
///
/// Counts writes per key so tests can assert that unchanged outputs are
/// never written again.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, Vec<u8>>,
    puts: DashMap<String, usize>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `key` holds a value.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of `put` calls made for `key`.
    pub fn put_count(&self, key: &str) -> usize {
        self.puts.get(key).map(|count| *count).unwrap_or(0)
    }

    /// Number of `put` calls across all keys.
    pub fn total_puts(&self) -> usize {
        self.puts.iter().map(|entry| *entry.value()).sum()
    }

    /// Stores a value without counting it as a write.
    pub fn seed(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.values.insert(key.to_string(), value.into());
    }
}

impl CacheStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
        let value = self.values.get(key).map(|v| v.value().clone());
        future::ready(Ok(value)).boxed()
    }

    fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<(), CacheError>> {
        *self.puts.entry(key.to_string()).or_insert(0) += 1;
        self.values.insert(key.to_string(), value);
        future::ready(Ok(())).boxed()
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, CacheError>> {
        future::ready(Ok(self.values.remove(key).is_some())).boxed()
    }

    fn keys<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, CacheError>> {
        let mut keys: Vec<String> = self
            .values
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        future::ready(Ok(keys)).boxed()
    }
}
