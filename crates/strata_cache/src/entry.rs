//! Persisted cache records and the on-disk state format.
//!
//! The state is stored as `build-cache.json` in the cache store:
//!
//! ```json
//! {
//!   "current":  { "/about": { "path": "/about", "hash": "…", "headers": [], "age": "new" } },
//!   "previous": { }
//! }
//! ```
//!
//! Maps are ordered by path so the file is stable across runs with the same
//! outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_common::ContentHash;

use crate::error::CacheError;

/// Store key of the persisted cache state.
pub const STATE_KEY: &str = "build-cache.json";

/// Whether an entry was produced this run or carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Age {
    /// Produced or changed during this run.
    New,
    /// Carried over unchanged from the previous run.
    Old,
}

/// One persisted artifact record, keyed by output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCacheEntry {
    /// Output path. Unique within one build.
    pub path: String,
    /// Hash the generation layer computed for this output.
    pub hash: ContentHash,
    /// Store key of the body, if the output has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
    /// Response headers as ordered name/value pairs.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Response status code, if not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// New or carried over.
    pub age: Age,
}

impl BuildCacheEntry {
    /// Returns `true` if the entry was produced this run.
    pub fn is_new(&self) -> bool {
        self.age == Age::New
    }
}

/// The output of generating one page, handed to [`BuildCache::add`].
///
/// [`BuildCache::add`]: crate::BuildCache::add
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Output path.
    pub path: String,
    /// Staleness key of the output.
    pub hash: ContentHash,
    /// Rendered body, if any.
    pub body: Option<Vec<u8>>,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response status code.
    pub status: Option<u16>,
}

impl GenerationResult {
    /// Creates a result with no body, headers or status.
    pub fn new(path: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            path: path.into(),
            hash,
            body: None,
            headers: Vec::new(),
            status: None,
        }
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// The persisted form of a build cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedBuildCache {
    /// Entries of the run that produced this state.
    #[serde(default)]
    pub current: BTreeMap<String, BuildCacheEntry>,
    /// Entries that run was diffed against.
    #[serde(default)]
    pub previous: BTreeMap<String, BuildCacheEntry>,
}

impl SerializedBuildCache {
    /// Parses a persisted state.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Corrupt {
            key: STATE_KEY.to_string(),
            reason: e.to_string(),
        })
    }

    /// Serializes the state as pretty-printed JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, body: &str, age: Age) -> BuildCacheEntry {
        BuildCacheEntry {
            path: path.to_string(),
            hash: ContentHash::from_bytes(body.as_bytes()),
            document_path: None,
            headers: Vec::new(),
            status: None,
            age,
        }
    }

    #[test]
    fn entry_json_shape() {
        let mut e = entry("/about", "about", Age::New);
        e.document_path = Some("documents/abc".to_string());
        e.headers = vec![("content-type".to_string(), "text/html".to_string())];
        e.status = Some(200);
        let value = serde_json::to_value(&e).unwrap();
        assert_eq!(value["path"], "/about");
        assert_eq!(value["hash"], e.hash.to_string());
        assert_eq!(value["documentPath"], "documents/abc");
        assert_eq!(value["headers"], serde_json::json!([["content-type", "text/html"]]));
        assert_eq!(value["status"], 200);
        assert_eq!(value["age"], "new");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let value = serde_json::to_value(entry("/", "root", Age::Old)).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("documentPath"));
        assert!(!object.contains_key("status"));
        assert_eq!(value["age"], "old");
    }

    #[test]
    fn state_parses_from_json() {
        let hash = ContentHash::from_bytes(b"x");
        let json = format!(
            r#"{{"current": {{"/x": {{"path": "/x", "hash": "{hash}", "headers": [], "age": "old"}}}}, "previous": {{}}}}"#
        );
        let state = SerializedBuildCache::from_json(json.as_bytes()).unwrap();
        assert_eq!(state.current["/x"].hash, hash);
        assert_eq!(state.current["/x"].age, Age::Old);
        assert!(state.previous.is_empty());
    }

    #[test]
    fn state_serialization_preserves_entries() {
        let mut state = SerializedBuildCache::default();
        state.current.insert("/b".into(), entry("/b", "b", Age::New));
        state.previous.insert("/a".into(), entry("/a", "a", Age::Old));
        let parsed = SerializedBuildCache::from_json(&state.to_json().unwrap()).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn garbage_state_is_corrupt() {
        let err = SerializedBuildCache::from_json(b"not json").unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { ref key, .. } if key == STATE_KEY));
    }

    #[test]
    fn generation_result_builder() {
        let result = GenerationResult::new("/p", ContentHash::from_bytes(b"p"))
            .with_body("<p>")
            .with_header("x-a", "1")
            .with_status(404);
        assert_eq!(result.body.as_deref(), Some(&b"<p>"[..]));
        assert_eq!(result.headers, vec![("x-a".to_string(), "1".to_string())]);
        assert_eq!(result.status, Some(404));
    }
}
