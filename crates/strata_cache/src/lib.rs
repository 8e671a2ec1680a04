//! Incremental build cache for generated artifacts.
//!
//! This crate records every generated output (a page, an asset) under its
//! output path together with a content hash. On the next run, outputs whose
//! hash is unchanged are carried over verbatim instead of being written again,
//! and the difference between two consecutive runs is exposed as a
//! [`Snapshot`] for exporters deciding what to publish or delete.

#![warn(missing_docs)]

pub mod cache;
pub mod document;
pub mod entry;
pub mod error;
pub mod snapshot;
pub mod store;

pub use cache::BuildCache;
pub use document::{decode_document, document_key, encode_document, DOCUMENTS_PREFIX};
pub use entry::{Age, BuildCacheEntry, GenerationResult, SerializedBuildCache, STATE_KEY};
pub use error::CacheError;
pub use snapshot::Snapshot;
pub use store::{CacheStore, FsStore, MemoryStore};
