//! Arena-backed module graph.
//!
//! Modules live in a single `Vec` and refer to each other through
//! [`ModuleIndex`] handles. Cyclic references are ordinary handles tagged
//! [`DependencyKind::Cycle`], so the graph can be compared, cloned and
//! dropped without any special cycle handling.

use std::collections::{HashMap, HashSet};

use strata_common::{ContentHash, ModuleSpecifier};

/// Stable identifier of the synthetic root node.
pub const ROOT_ID: &str = "root";

/// A handle to a [`Module`] in a [`ModuleGraph`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ModuleIndex(u32);

impl ModuleIndex {
    /// Creates a `ModuleIndex` from a raw `u32` value.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` value.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn offset(self, by: u32) -> Self {
        Self(self.0 + by)
    }
}

/// How a dependency edge participates in hashing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DependencyKind {
    /// Ordinary edge. The target's aggregate hash feeds the parent's.
    Static,
    /// Back-reference to a module that was still being visited when the
    /// reference was found. Only the target's content hash feeds the parent's.
    Cycle,
}

/// An edge from a module to one of its dependencies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Dependency {
    /// The referenced module.
    pub module: ModuleIndex,
    /// Edge kind.
    pub kind: DependencyKind,
}

/// One resolved and loaded module, as seen from one entrypoint.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Module {
    /// Canonical specifier.
    pub specifier: ModuleSpecifier,
    /// The entrypoint whose walk produced this module.
    pub entrypoint: ModuleSpecifier,
    /// Hash of this module's own bytes.
    pub content_hash: ContentHash,
    /// Content hash combined with all dependency hashes.
    pub module_hash: ContentHash,
    /// Local dependencies in declaration order.
    pub dependencies: Vec<Dependency>,
    /// External references in declaration order. Never loaded or hashed.
    pub externals: Vec<String>,
}

/// The synthetic top-level node.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Root {
    /// Always [`ROOT_ID`].
    pub id: &'static str,
    /// Ordered combination of the entrypoint modules' aggregate hashes.
    pub hash: ContentHash,
    /// One entry module per requested entrypoint, in request order.
    pub children: Vec<ModuleIndex>,
}

/// The result of one graph build.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ModuleGraph {
    root: Root,
    modules: Vec<Module>,
    index: HashMap<ModuleSpecifier, HashMap<ModuleSpecifier, ModuleIndex>>,
}

impl ModuleGraph {
    pub(crate) fn empty() -> Self {
        Self {
            root: Root {
                id: ROOT_ID,
                hash: ContentHash::combine(std::iter::empty()),
                children: Vec::new(),
            },
            modules: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Appends the modules of one entrypoint walk, rebasing their handles.
    ///
    /// Returns the rebased handle of `entry`.
    pub(crate) fn extend(&mut self, modules: Vec<Module>, entry: ModuleIndex) -> ModuleIndex {
        let base = self.modules.len() as u32;
        for mut module in modules {
            for dep in &mut module.dependencies {
                dep.module = dep.module.offset(base);
            }
            let handle = ModuleIndex(self.modules.len() as u32);
            self.index
                .entry(module.entrypoint.clone())
                .or_default()
                .insert(module.specifier.clone(), handle);
            self.modules.push(module);
        }
        entry.offset(base)
    }

    pub(crate) fn set_root(&mut self, children: Vec<ModuleIndex>) {
        let hash = ContentHash::combine(children.iter().map(|c| self.modules[c.as_usize()].module_hash));
        self.root = Root {
            id: ROOT_ID,
            hash,
            children,
        };
    }

    /// Returns the root node.
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Returns the root's aggregate hash.
    pub fn hash(&self) -> ContentHash {
        self.root.hash
    }

    /// Returns the module behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this graph.
    pub fn module(&self, index: ModuleIndex) -> &Module {
        &self.modules[index.as_usize()]
    }

    /// Looks up the module `specifier` as reached from `entrypoint`.
    pub fn get(&self, entrypoint: &ModuleSpecifier, specifier: &ModuleSpecifier) -> Option<ModuleIndex> {
        self.index.get(entrypoint)?.get(specifier).copied()
    }

    /// Returns the entry module of `entrypoint`.
    pub fn entry_module(&self, entrypoint: &ModuleSpecifier) -> Option<&Module> {
        self.get(entrypoint, entrypoint).map(|idx| self.module(idx))
    }

    /// Iterates over all modules with their handles.
    pub fn modules(&self) -> impl Iterator<Item = (ModuleIndex, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleIndex(i as u32), m))
    }

    /// Total number of modules across all entrypoints.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if the graph has no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Depth-first preorder over the modules reachable from `entrypoint`.
    ///
    /// Every module is yielded once. Cycle edges are not followed, since
    /// their targets are already on the path.
    pub fn walk(&self, entrypoint: &ModuleSpecifier) -> Vec<ModuleIndex> {
        let mut order = Vec::new();
        let Some(start) = self.get(entrypoint, entrypoint) else {
            return order;
        };
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            order.push(idx);
            let deps = &self.module(idx).dependencies;
            for dep in deps.iter().rev() {
                if dep.kind == DependencyKind::Static && !seen.contains(&dep.module) {
                    stack.push(dep.module);
                }
            }
        }
        order
    }
}
