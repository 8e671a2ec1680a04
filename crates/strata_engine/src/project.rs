//! Engine wiring for an on-disk project described by `strata.toml`.

use std::path::Path;

use strata_cache::FsStore;
use strata_common::ModuleSpecifier;
use strata_config::{load_config, resolve_paths, ConfigError, ResolvedPaths, SiteConfig};
use strata_graph::{BuildOptions, FsLoader, ModuleGraph, ReferenceExtractor};

use crate::engine::{BuildReport, Engine};
use crate::error::EngineError;
use crate::page::{Page, Renderer};

/// A configured project: filesystem loader, filesystem cache store and the
/// entrypoints listed in its configuration.
pub struct Project<E> {
    config: SiteConfig,
    paths: ResolvedPaths,
    engine: Engine<FsLoader<E>, FsStore>,
}

impl<E: ReferenceExtractor> Project<E> {
    /// Loads `<project_dir>/strata.toml` and wires an engine for it.
    pub fn open(project_dir: &Path, extractor: E) -> Result<Self, EngineError> {
        let project_dir = if project_dir.is_absolute() {
            project_dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::from)?
                .join(project_dir)
        };
        let config = load_config(&project_dir)?;
        Self::from_config(config, &project_dir, extractor)
    }

    /// Wires an engine for an already loaded configuration.
    ///
    /// `project_dir` must be absolute; entrypoints resolve against the
    /// configured source root beneath it.
    pub fn from_config(
        config: SiteConfig,
        project_dir: &Path,
        extractor: E,
    ) -> Result<Self, EngineError> {
        let paths = resolve_paths(&config, project_dir);
        let referrer = ModuleSpecifier::from_directory_path(&paths.root)
            .map_err(|err| ConfigError::ValidationError(format!("site.root: {err}")))?;

        let mut loader = FsLoader::new(extractor);
        if let Some(schemes) = &config.graph.external_schemes {
            loader = loader.with_external_schemes(schemes.iter().cloned());
        }
        let options = BuildOptions {
            referrer,
            share_across_entrypoints: config.graph.share_across_entrypoints,
        };
        let engine = Engine::new(loader, FsStore::new(&paths.cache_dir)).with_options(options);

        Ok(Self {
            config,
            paths,
            engine,
        })
    }

    /// Returns the parsed configuration.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Returns the resolved project locations.
    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &Engine<FsLoader<E>, FsStore> {
        &self.engine
    }

    /// Builds the module graph for the configured entrypoints.
    pub async fn build_graph(&self) -> Result<ModuleGraph, EngineError> {
        self.engine.build_graph(self.config.site.entrypoints.as_slice()).await
    }

    /// Runs an incremental build over `pages`.
    pub async fn build<R: Renderer + ?Sized>(
        &self,
        pages: &[Page],
        renderer: &R,
    ) -> Result<BuildReport, EngineError> {
        self.engine.build(pages, renderer).await
    }
}

#[cfg(test)]
mod tests {
    use strata_config::load_config_from_str;
    use strata_graph::NoReferences;

    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn imports(_specifier: &ModuleSpecifier, content: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(content)
            .lines()
            .filter_map(|line| line.strip_prefix("import "))
            .map(|s| s.trim().to_string())
            .collect()
    }

    #[test]
    fn wiring_follows_config() {
        let config = load_config_from_str(
            r#"
[site]
root = "src"
entrypoints = ["./index.ts"]

[cache]
dir = "out/cache"

[graph]
share_across_entrypoints = true
"#,
        )
        .unwrap();
        let project =
            Project::from_config(config, Path::new("/work/site"), NoReferences).unwrap();
        let options = project.engine().options();
        assert_eq!(options.referrer.as_str(), "file:///work/site/src/");
        assert!(options.share_across_entrypoints);
        assert_eq!(
            project.engine().store().root(),
            Path::new("/work/site/out/cache")
        );
    }

    #[tokio::test]
    async fn open_builds_graph_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "strata.toml",
            "[site]\nroot = \"src\"\nentrypoints = [\"./index.ts\"]\n",
        );
        write(dir.path(), "src/index.ts", "import ./lib/util.ts\nimport npm:preact\n");
        write(dir.path(), "src/lib/util.ts", "export const x = 1;\n");

        let project = Project::open(dir.path(), imports).unwrap();
        let graph = project.build_graph().await.unwrap();
        assert_eq!(graph.len(), 2);
        let entry = graph.module(graph.root().children[0]);
        assert_eq!(entry.externals, vec!["npm:preact"]);
    }

    #[test]
    fn relative_project_dir_is_rejected() {
        let config = load_config_from_str("[site]\nentrypoints = [\"./index.ts\"]\n").unwrap();
        let err = Project::from_config(config, Path::new("site"), NoReferences)
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Config(ConfigError::ValidationError(_))));
    }

    #[test]
    fn open_without_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Project::open(dir.path(), NoReferences).err().unwrap();
        assert!(matches!(err, EngineError::Config(ConfigError::IoError(_))));
    }
}
