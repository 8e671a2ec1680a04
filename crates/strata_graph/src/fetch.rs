//! Single-flight module fetching.
//!
//! A fetch resolves, loads and hashes one module. Results are memoized per
//! `(entrypoint, specifier)` key in a shared cell: the first request performs
//! the I/O and every other request, concurrent or later, awaits the same cell.
//! Failures are memoized as well, so a failed load is never re-issued within
//! one build.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use strata_common::{ContentHash, ModuleSpecifier};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{GraphError, LoadError};
use crate::loader::{Loader, Resolution};

/// A resolved, loaded and hashed module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedModule {
    /// The module's canonical specifier.
    pub specifier: ModuleSpecifier,
    /// Hash of the module's own bytes.
    pub content_hash: ContentHash,
    /// Resolved references in declaration order.
    pub references: Vec<Resolution>,
}

type FetchResult = Result<Arc<FetchedModule>, GraphError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FetchKey {
    entrypoint: Option<ModuleSpecifier>,
    specifier: ModuleSpecifier,
}

/// Memoizing, deduplicating front end over a [`Loader`].
pub struct ModuleFetcher<'l, L: ?Sized> {
    loader: &'l L,
    share_across_entrypoints: bool,
    cells: DashMap<FetchKey, Arc<OnceCell<FetchResult>>>,
}

impl<'l, L: Loader + ?Sized> ModuleFetcher<'l, L> {
    /// Creates a fetcher over `loader`.
    ///
    /// With `share_across_entrypoints` set, the entrypoint is dropped from the
    /// memo key and each module is read once per build instead of once per
    /// entrypoint.
    pub fn new(loader: &'l L, share_across_entrypoints: bool) -> Self {
        Self {
            loader,
            share_across_entrypoints,
            cells: DashMap::new(),
        }
    }

    /// Fetches `specifier` on behalf of `entrypoint`.
    pub async fn fetch(&self, entrypoint: &ModuleSpecifier, specifier: &ModuleSpecifier) -> FetchResult {
        let key = FetchKey {
            entrypoint: (!self.share_across_entrypoints).then(|| entrypoint.clone()),
            specifier: specifier.clone(),
        };
        let cell = self
            .cells
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_init(|| self.fetch_uncached(specifier)).await.clone()
    }

    /// Number of distinct keys requested so far.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if nothing has been fetched.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    async fn fetch_uncached(&self, specifier: &ModuleSpecifier) -> FetchResult {
        let response = self
            .loader
            .load(specifier)
            .await
            .map_err(|e| LoadError::new(specifier, e))?;
        let content_hash = ContentHash::from_bytes(&response.content);

        let resolutions = join_all(
            response
                .references
                .iter()
                .map(|reference| self.loader.resolve(reference, specifier)),
        )
        .await;
        let references = resolutions.into_iter().collect::<Result<Vec<_>, _>>()?;

        debug!(
            module = %specifier,
            hash = %content_hash,
            references = references.len(),
            "fetched module"
        );

        Ok(Arc::new(FetchedModule {
            specifier: specifier.clone(),
            content_hash,
            references,
        }))
    }
}
