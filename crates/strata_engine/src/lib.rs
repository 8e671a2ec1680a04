//! Incremental build orchestration.
//!
//! Ties the module graph and the build cache together: the graph yields a
//! staleness key per page, pages whose key matches the previous run are
//! carried over without rendering, and the rest are rendered and recorded.
//! Committing the cache produces the [`Snapshot`](strata_cache::Snapshot)
//! exporters consume.

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod page;
pub mod project;

pub use engine::{page_hash, BuildReport, Engine};
pub use error::{EngineError, RenderError};
pub use page::{Page, Renderer};
pub use project::Project;
