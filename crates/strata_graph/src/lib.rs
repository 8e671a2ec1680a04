//! Content-addressed module dependency graph.
//!
//! This crate walks a set of entrypoints through a pluggable [`Loader`],
//! reading every `(entrypoint, module)` pair at most once, and produces a
//! [`ModuleGraph`] whose per-module aggregate hashes change whenever any
//! transitively reachable module changes. Cyclic references are allowed and
//! are recorded as back-edges rather than followed.

#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod fetch;
pub mod fs;
pub mod graph;
pub mod loader;
pub mod memory;

pub use builder::{build_graph, BuildOptions, GraphBuilder};
pub use error::{GraphError, LoadError, ResolutionError};
pub use fetch::{FetchedModule, ModuleFetcher};
pub use fs::{FsLoader, NoReferences, ReferenceExtractor};
pub use graph::{Dependency, DependencyKind, Module, ModuleGraph, ModuleIndex, Root, ROOT_ID};
pub use loader::{resolve_specifier, LoadResponse, Loader, Resolution, DEFAULT_EXTERNAL_SCHEMES};
pub use memory::MemoryLoader;
