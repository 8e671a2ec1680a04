//! Filesystem loader adapter.

use std::io;

use futures_util::future::{self, BoxFuture, FutureExt};
use strata_common::ModuleSpecifier;

use crate::error::ResolutionError;
use crate::loader::{resolve_specifier, LoadResponse, Loader, Resolution, DEFAULT_EXTERNAL_SCHEMES};

/// Discovers the references declared by a module's source.
///
/// Parsing source text is the embedder's business; this trait is the seam.
/// Any `Fn(&ModuleSpecifier, &[u8]) -> Vec<String>` closure implements it.
pub trait ReferenceExtractor: Send + Sync {
    /// Returns the referenced specifiers in declaration order.
    fn references(&self, specifier: &ModuleSpecifier, content: &[u8]) -> Vec<String>;
}

impl<F> ReferenceExtractor for F
where
    F: Fn(&ModuleSpecifier, &[u8]) -> Vec<String> + Send + Sync,
{
    fn references(&self, specifier: &ModuleSpecifier, content: &[u8]) -> Vec<String> {
        self(specifier, content)
    }
}

/// Extractor for leaf assets that never reference anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ReferenceExtractor for NoReferences {
    fn references(&self, _specifier: &ModuleSpecifier, _content: &[u8]) -> Vec<String> {
        Vec::new()
    }
}

/// A [`Loader`] reading `file:` modules from disk with `tokio::fs`.
///
/// Only `file:` specifiers are loadable. References resolving to a configured
/// external scheme are skipped; any other scheme is a resolution error.
pub struct FsLoader<E> {
    extractor: E,
    external_schemes: Vec<String>,
}

impl<E: ReferenceExtractor> FsLoader<E> {
    /// Creates a loader using [`DEFAULT_EXTERNAL_SCHEMES`].
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            external_schemes: DEFAULT_EXTERNAL_SCHEMES.iter().map(|s| s.to_string()).collect(),
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

    fn resolve_sync(
        &self,
        specifier: &str,
        referrer: &ModuleSpecifier,
    ) -> Result<Resolution, ResolutionError> {
        let resolution = resolve_specifier(specifier, referrer, self.external_schemes.as_slice())?;
        if let Resolution::Module(module) = &resolution {
            if module.scheme() != "file:" {
                return Err(ResolutionError::new(
                    specifier,
                    referrer,
                    format!("unsupported scheme '{}'", module.scheme()),
                ));
            }
        }
        Ok(resolution)
    }
}

impl<E: ReferenceExtractor> Loader for FsLoader<E> {
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        referrer: &'a ModuleSpecifier,
    ) -> BoxFuture<'a, Result<Resolution, ResolutionError>> {
        future::ready(self.resolve_sync(specifier, referrer)).boxed()
    }

    fn load<'a>(&'a self, specifier: &'a ModuleSpecifier) -> BoxFuture<'a, io::Result<LoadResponse>> {
        async move {
            let path = specifier.to_file_path().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("{specifier} is not a file: specifier"),
                )
            })?;
            let content = tokio::fs::read(&path).await?;
            let references = self.extractor.references(specifier, &content);
            Ok(LoadResponse {
                content,
                references,
            })
        }
        .boxed()
    }
}
