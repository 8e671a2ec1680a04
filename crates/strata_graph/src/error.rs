//! Error types for graph construction.

use std::io;
use std::sync::Arc;

use strata_common::ModuleSpecifier;

/// A reference could not be resolved to a canonical module specifier.
///
/// Fatal to the build: the invoking orchestrator decides whether to abort.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unable to resolve '{specifier}' from '{referrer}': {reason}")]
pub struct ResolutionError {
    /// The specifier as written in the referring module.
    pub specifier: String,
    /// The module containing the reference.
    pub referrer: ModuleSpecifier,
    /// Why resolution failed.
    pub reason: String,
}

impl ResolutionError {
    /// Creates a resolution error for `specifier` referenced from `referrer`.
    pub fn new(
        specifier: impl Into<String>,
        referrer: &ModuleSpecifier,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            specifier: specifier.into(),
            referrer: referrer.clone(),
            reason: reason.into(),
        }
    }
}

/// A resolved module could not be read.
///
/// The underlying I/O error is kept intact as the error source. It is shared
/// behind an `Arc` so that every caller waiting on the same in-flight load
/// receives the same failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to load '{specifier}': {source}")]
pub struct LoadError {
    /// The module that failed to load.
    pub specifier: ModuleSpecifier,
    /// The I/O failure reported by the loader.
    pub source: Arc<io::Error>,
}

impl LoadError {
    /// Wraps an I/O failure for `specifier`.
    pub fn new(specifier: &ModuleSpecifier, source: io::Error) -> Self {
        Self {
            specifier: specifier.clone(),
            source: Arc::new(source),
        }
    }

    /// Returns the kind of the underlying I/O error.
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// Errors that abort graph construction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    /// A reference could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A module could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
}
