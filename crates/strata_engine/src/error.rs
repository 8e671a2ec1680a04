//! Error types for build orchestration.

use strata_cache::CacheError;
use strata_config::ConfigError;
use strata_graph::GraphError;

/// Error returned by a [`Renderer`](crate::Renderer).
pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a build.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The module graph could not be built.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The build cache could not be written or the snapshot could not be read.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The project configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A page names an entrypoint that is not part of the graph.
    #[error("entrypoint '{0}' is not part of the module graph")]
    UnknownEntrypoint(String),

    /// The renderer failed for one page.
    #[error("failed to render '{path}': {source}")]
    Render {
        /// Output path of the page.
        path: String,
        /// The renderer's error.
        source: RenderError,
    },
}
