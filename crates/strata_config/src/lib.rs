//! Parsing and validation of `strata.toml` site configuration files.
//!
//! This crate reads the site configuration file and produces a strongly-typed
//! [`SiteConfig`], plus the filesystem locations derived from it.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_paths, ResolvedPaths};
pub use types::*;
