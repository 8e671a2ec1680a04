//! The resolver/loader boundary supplied by the embedding system.

use std::io;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use strata_common::ModuleSpecifier;

use crate::error::ResolutionError;

/// URL schemes treated as external unless configured otherwise.
///
/// External modules are never loaded or hashed and contribute nothing to any
/// aggregate hash.
pub const DEFAULT_EXTERNAL_SCHEMES: &[&str] = &["http:", "https:", "npm:", "jsr:", "node:", "data:"];

/// Outcome of resolving a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A local module that must be loaded and hashed.
    Module(ModuleSpecifier),
    /// A module owned by someone else; skipped by the graph walk.
    External(String),
}

impl Resolution {
    /// Returns the module specifier if this is a local module.
    pub fn as_module(&self) -> Option<&ModuleSpecifier> {
        match self {
            Resolution::Module(specifier) => Some(specifier),
            Resolution::External(_) => None,
        }
    }

    /// Returns `true` for external resolutions.
    pub fn is_external(&self) -> bool {
        matches!(self, Resolution::External(_))
    }
}

/// Raw content of a loaded module plus the references it declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadResponse {
    /// The module's bytes, hashed as-is.
    pub content: Vec<u8>,
    /// Referenced specifiers in declaration order, unresolved.
    pub references: Vec<String>,
}

/// Resolves and loads modules for the graph builder.
///
/// This is a pure I/O boundary. Implementations own their timeout and
/// cancellation policy; the builder never retries a failed call.
pub trait Loader: Send + Sync {
    /// Resolves `specifier` as written inside `referrer`.
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        referrer: &'a ModuleSpecifier,
    ) -> BoxFuture<'a, Result<Resolution, ResolutionError>>;

    /// Loads the content and references of a resolved module.
    fn load<'a>(&'a self, specifier: &'a ModuleSpecifier) -> BoxFuture<'a, io::Result<LoadResponse>>;
}

impl<T: Loader + ?Sized> Loader for &T {
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        referrer: &'a ModuleSpecifier,
    ) -> BoxFuture<'a, Result<Resolution, ResolutionError>> {
        (**self).resolve(specifier, referrer)
    }

    fn load<'a>(&'a self, specifier: &'a ModuleSpecifier) -> BoxFuture<'a, io::Result<LoadResponse>> {
        (**self).load(specifier)
    }
}

impl<T: Loader + ?Sized> Loader for Arc<T> {
    fn resolve<'a>(
        &'a self,
        specifier: &'a str,
        referrer: &'a ModuleSpecifier,
    ) -> BoxFuture<'a, Result<Resolution, ResolutionError>> {
        (**self).resolve(specifier, referrer)
    }

    fn load<'a>(&'a self, specifier: &'a ModuleSpecifier) -> BoxFuture<'a, io::Result<LoadResponse>> {
        (**self).load(specifier)
    }
}

/// Shared resolution rules used by the bundled loaders.
///
/// Relative and absolute references are joined onto the referrer. Anything
/// whose scheme is listed in `external_schemes` becomes [`Resolution::External`].
/// Bare specifiers are rejected.
pub fn resolve_specifier<S: AsRef<str>>(
    specifier: &str,
    referrer: &ModuleSpecifier,
    external_schemes: &[S],
) -> Result<Resolution, ResolutionError> {
    let resolved = referrer.join(specifier).ok_or_else(|| {
        ResolutionError::new(
            specifier,
            referrer,
            "bare specifier is not mapped to a module or external scheme",
        )
    })?;
    let external = external_schemes
        .iter()
        .any(|scheme| scheme.as_ref() == resolved.scheme());
    if external {
        Ok(Resolution::External(resolved.into()))
    } else {
        Ok(Resolution::Module(resolved))
    }
}
