//! Shared foundational types used across the strata build engine.
//!
//! This crate provides the content hashing primitive used for change detection
//! and the canonical module specifier type shared by the graph and cache layers.

#![warn(missing_docs)]

pub mod hash;
pub mod specifier;

pub use hash::{ContentHash, Hasher, ParseHashError};
pub use specifier::{ModuleSpecifier, SpecifierError};
