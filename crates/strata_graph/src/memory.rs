//! In-memory loader for embedding and tests.

use std::collections::HashMap;
use std::io;

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};
use strata_common::{ModuleSpecifier, SpecifierError};

use crate::error::ResolutionError;
use crate::loader::{resolve_specifier, LoadResponse, Loader, Resolution, DEFAULT_EXTERNAL_SCHEMES};

/// A [`Loader`] serving modules from an in-memory table.
///
/// Every call to [`Loader::load`] is counted per specifier, which makes it
/// possible to verify that the builder reads each module only once.
pub struct MemoryLoader {
    modules: HashMap<ModuleSpecifier, LoadResponse>,
    external_schemes: Vec<String>,
    loads: DashMap<ModuleSpecifier, usize>,
}

impl MemoryLoader {
    /// Creates an empty loader using [`DEFAULT_EXTERNAL_SCHEMES`].
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
            external_schemes: DEFAULT_EXTERNAL_SCHEMES.iter().map(|s| s.to_string()).collect(),
            loads: DashMap::new(),
        }
    }

    /// Replaces the set of schemes treated as external.
    pub fn with_external_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_schemes = schemes.into_iter().map(Into::into).collect();
        self
    }

    /// Registers (or replaces) a module.
    pub fn insert<I, S>(
        &mut self,
        specifier: &str,
        content: impl Into<Vec<u8>>,
        references: I,
    ) -> Result<&mut Self, SpecifierError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let specifier = ModuleSpecifier::parse(specifier)?;
        self.modules.insert(
            specifier,
            LoadResponse {
                content: content.into(),
                references: references.into_iter().map(Into::into).collect(),
            },
        );
        Ok(self)
    }

    /// Removes a module, so that later loads fail with `NotFound`.
    pub fn remove(&mut self, specifier: &str) -> bool {
        ModuleSpecifier::parse(specifier)
            .map(|s| self.modules.remove(&s).is_some())
            .unwrap_or(false)
    }

    /// Number of times `specifier` has been loaded.
    pub fn load_count(&self, specifier: &str) -> usize {
        ModuleSpecifier::parse(specifier)
            .ok()
            .and_then(|s| self.loads.get(&s).map(|count| *count))
            .unwrap_or(0)
    }

    /// Total number of loads across all modules.
    pub fn total_loads(&self) -> usize {
        self.loads.iter().map(|entry| *entry.value()).sum()
    }

    /// Clears the load counters.
    pub fn reset_counts(&self) {
        self.loads.clear();
    }
}

impl Default for MemoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader for MemoryLoader {
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        referrer: &'a ModuleSpecifier,
    ) -> BoxFuture<'a, Result<Resolution, ResolutionError>> {
        future::ready(resolve_specifier(specifier, referrer, self.external_schemes.as_slice())).boxed()
    }

    fn load<'a>(&'a self, specifier: &'a ModuleSpecifier) -> BoxFuture<'a, io::Result<LoadResponse>> {
        *self.loads.entry(specifier.clone()).or_insert(0) += 1;
        let response = self.modules.get(specifier).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no module registered for {specifier}"),
            )
        });
        future::ready(response).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> ModuleSpecifier {
        ModuleSpecifier::parse(s).unwrap()
    }

    #[tokio::test]
    async fn load_registered_module() {
        let mut loader = MemoryLoader::new();
        loader.insert("mem:/a", "export {}", ["./b"]).unwrap();

        let response = loader.load(&spec("mem:/a")).await.unwrap();
        assert_eq!(response.content, b"export {}");
        assert_eq!(response.references, vec!["./b"]);
        assert_eq!(loader.load_count("mem:/a"), 1);
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let loader = MemoryLoader::new();
        let err = loader.load(&spec("mem:/missing")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(loader.load_count("mem:/missing"), 1);
    }

    #[tokio::test]
    async fn resolve_relative_and_external() {
        let loader = MemoryLoader::new();
        let referrer = spec("mem:/pages/index");
        let local = loader.resolve("./about", &referrer).await.unwrap();
        assert_eq!(local, Resolution::Module(spec("mem:/pages/about")));
        let external = loader.resolve("https://cdn.test/x.js", &referrer).await.unwrap();
        assert!(external.is_external());
    }

    #[tokio::test]
    async fn counters_reset() {
        let mut loader = MemoryLoader::new();
        loader.insert("mem:/a", "a", Vec::<String>::new()).unwrap();
        loader.load(&spec("mem:/a")).await.unwrap();
        loader.load(&spec("mem:/a")).await.unwrap();
        assert_eq!(loader.total_loads(), 2);
        loader.reset_counts();
        assert_eq!(loader.total_loads(), 0);
    }

    #[test]
    fn insert_rejects_schemeless() {
        let mut loader = MemoryLoader::new();
        assert!(loader.insert("a.ts", "x", Vec::<String>::new()).is_err());
    }

    #[test]
    fn remove_module() {
        let mut loader = MemoryLoader::new();
        loader.insert("mem:/a", "a", Vec::<String>::new()).unwrap();
        assert!(loader.remove("mem:/a"));
        assert!(!loader.remove("mem:/a"));
    }
}
