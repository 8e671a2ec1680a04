//! Path resolution: anchoring configured locations at the project directory.

use crate::types::SiteConfig;
use std::path::{Path, PathBuf};

/// Filesystem locations derived from a [`SiteConfig`].
///
/// Relative settings are joined onto the project directory; absolute ones are
/// kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Directory containing `strata.toml`.
    pub project_dir: PathBuf,
    /// Source root that entrypoints are resolved against.
    pub root: PathBuf,
    /// Directory backing the build cache store.
    pub cache_dir: PathBuf,
}

/// Resolves the configured source root and cache directory.
pub fn resolve_paths(config: &SiteConfig, project_dir: &Path) -> ResolvedPaths {
    let root = if config.site.root == "." {
        project_dir.to_path_buf()
    } else {
        project_dir.join(&config.site.root)
    };
    ResolvedPaths {
        project_dir: project_dir.to_path_buf(),
        root,
        cache_dir: project_dir.join(&config.cache.dir),
    }
}
