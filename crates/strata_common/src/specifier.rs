//! Canonical URL-like module identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// A canonical, URL-like module identifier such as `file:///src/app.ts`.
///
/// Backed by [`Url`], so every constructor yields the normalized form: dot
/// segments are resolved and path characters are percent-encoded. Two
/// spellings of the same module compare equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleSpecifier(Url);

/// Error returned when a [`ModuleSpecifier`] cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecifierError {
    /// The input has no `scheme:` prefix.
    #[error("'{0}' is not a URL: missing scheme")]
    MissingScheme(String),

    /// The input has a scheme but is not a valid URL.
    #[error("'{input}' is not a valid URL: {source}")]
    Invalid {
        /// The rejected input.
        input: String,
        /// What the URL parser objected to.
        source: url::ParseError,
    },

    /// A filesystem path was not absolute.
    #[error("'{}' is not an absolute path", .0.display())]
    NotAbsolute(PathBuf),
}

impl ModuleSpecifier {
    /// Parses an absolute specifier.
    ///
    /// Single-letter schemes are rejected so that Windows drive paths (`C:`)
    /// are never mistaken for URLs.
    pub fn parse(input: &str) -> Result<Self, SpecifierError> {
        match Url::parse(input) {
            Ok(url) if url.scheme().len() > 1 => Ok(Self(url)),
            Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
                Err(SpecifierError::MissingScheme(input.to_string()))
            }
            Err(source) => Err(SpecifierError::Invalid {
                input: input.to_string(),
                source,
            }),
        }
    }

    /// Returns `file:///`, the root of the local filesystem.
    pub fn file_root() -> Self {
        Self(Url::parse("file:///").expect("`file:///` is a valid URL"))
    }

    /// Builds a `file://` specifier from an absolute filesystem path.
    pub fn from_file_path(path: &Path) -> Result<Self, SpecifierError> {
        Url::from_file_path(path)
            .map(Self)
            .map_err(|()| SpecifierError::NotAbsolute(path.to_path_buf()))
    }

    /// Builds a `file://` specifier for a directory, with a trailing slash so
    /// that relative references join beneath it.
    pub fn from_directory_path(path: &Path) -> Result<Self, SpecifierError> {
        Url::from_directory_path(path)
            .map(Self)
            .map_err(|()| SpecifierError::NotAbsolute(path.to_path_buf()))
    }

    /// Returns the filesystem path for a `file:` specifier.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.0.to_file_path().ok()
    }

    /// Returns the scheme including the trailing colon, e.g. `"file:"`.
    pub fn scheme(&self) -> &str {
        &self.0.as_str()[..self.0.scheme().len() + 1]
    }

    /// Returns the specifier text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the underlying URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Resolves `reference` against this specifier.
    ///
    /// References starting with `/`, `./` or `../` are joined onto this
    /// specifier's path. Anything else must be an absolute specifier. Bare
    /// references return `None`; whether they are external or an error is
    /// the resolver's decision.
    pub fn join(&self, reference: &str) -> Option<ModuleSpecifier> {
        let relative = reference.starts_with("./")
            || reference.starts_with("../")
            || reference.starts_with('/');
        if !relative {
            return Self::parse(reference).ok();
        }
        self.0.join(reference).ok().map(Self)
    }
}

impl fmt::Display for ModuleSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ModuleSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleSpecifier({})", self.as_str())
    }
}

impl TryFrom<String> for ModuleSpecifier {
    type Error = SpecifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModuleSpecifier> for String {
    fn from(value: ModuleSpecifier) -> Self {
        value.0.into()
    }
}

impl AsRef<str> for ModuleSpecifier {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
