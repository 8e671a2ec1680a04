//! Dependency graph construction.
//!
//! Each entrypoint is walked depth-first in declaration order. The walk keeps
//! the set of modules currently on the active path; a reference to one of them
//! is recorded as a [`DependencyKind::Cycle`] edge and not followed. Such an
//! edge contributes only the target's content hash to the referrer, as if the
//! target had no dependencies. Every other edge contributes the target's full
//! aggregate hash.
//!
//! The consequence is that a module's aggregate hash depends on where the walk
//! entered the cycle it belongs to. For `A -> B -> A` walked from `A`, `B`
//! folds in `A`'s content hash while `A` folds in `B`'s aggregate hash; walked
//! from `B`, the roles swap. Downstream staleness checks rely on exactly this
//! behavior, so it must not be "symmetrized".

use std::collections::{HashMap, HashSet};

use futures_util::future::{join_all, BoxFuture, FutureExt};
use strata_common::{ContentHash, Hasher, ModuleSpecifier};
use tracing::{debug, info, trace};

use crate::error::{GraphError, ResolutionError};
use crate::fetch::ModuleFetcher;
use crate::graph::{Dependency, DependencyKind, Module, ModuleGraph, ModuleIndex};
use crate::loader::{Loader, Resolution};

/// Options controlling a graph build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Referrer used to resolve the entrypoint specifiers themselves.
    pub referrer: ModuleSpecifier,
    /// Read each module once per build rather than once per entrypoint.
    pub share_across_entrypoints: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            referrer: ModuleSpecifier::file_root(),
            share_across_entrypoints: false,
        }
    }
}

/// Builds [`ModuleGraph`]s through a [`Loader`].
pub struct GraphBuilder<'l, L: ?Sized> {
    loader: &'l L,
    options: BuildOptions,
}

impl<'l, L: Loader + ?Sized> GraphBuilder<'l, L> {
    /// Creates a builder with default options.
    pub fn new(loader: &'l L) -> Self {
        Self {
            loader,
            options: BuildOptions::default(),
        }
    }

    /// Replaces the build options.
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Walks `entrypoints` and returns the resulting graph.
    ///
    /// Entrypoints are resolved against [`BuildOptions::referrer`] and must
    /// resolve to local modules. Walks for distinct entrypoints run
    /// concurrently; a repeated entrypoint is walked once and appears in the
    /// root once per occurrence. The first error, in entrypoint order, aborts
    /// the build.
    pub async fn build<S: AsRef<str>>(&self, entrypoints: &[S]) -> Result<ModuleGraph, GraphError> {
        let mut resolved = Vec::with_capacity(entrypoints.len());
        for entrypoint in entrypoints {
            let entrypoint = entrypoint.as_ref();
            match self.loader.resolve(entrypoint, &self.options.referrer).await? {
                Resolution::Module(specifier) => resolved.push(specifier),
                Resolution::External(_) => {
                    return Err(ResolutionError::new(
                        entrypoint,
                        &self.options.referrer,
                        "entrypoint resolves to an external module",
                    )
                    .into())
                }
            }
        }

        let mut unique: Vec<&ModuleSpecifier> = Vec::new();
        for specifier in &resolved {
            if !unique.contains(&specifier) {
                unique.push(specifier);
            }
        }

        let fetcher = ModuleFetcher::new(self.loader, self.options.share_across_entrypoints);
        let walks = join_all(unique.iter().map(|entry| walk_entrypoint(&fetcher, (*entry).clone()))).await;

        let mut graph = ModuleGraph::empty();
        let mut entries: HashMap<&ModuleSpecifier, ModuleIndex> = HashMap::new();
        for (entry, walk) in unique.iter().zip(walks) {
            let (modules, local) = walk?;
            entries.insert(*entry, graph.extend(modules, local));
        }
        let children = resolved.iter().filter_map(|s| entries.get(s).copied()).collect();
        graph.set_root(children);

        info!(
            entrypoints = resolved.len(),
            modules = graph.len(),
            loads = fetcher.len(),
            hash = %graph.hash(),
            "module graph built"
        );
        Ok(graph)
    }
}

/// Convenience wrapper around [`GraphBuilder`].
pub async fn build_graph<L, S>(
    loader: &L,
    entrypoints: &[S],
    options: BuildOptions,
) -> Result<ModuleGraph, GraphError>
where
    L: Loader + ?Sized,
    S: AsRef<str>,
{
    GraphBuilder::new(loader).with_options(options).build(entrypoints).await
}

async fn walk_entrypoint<L: Loader + ?Sized>(
    fetcher: &ModuleFetcher<'_, L>,
    entrypoint: ModuleSpecifier,
) -> Result<(Vec<Module>, ModuleIndex), GraphError> {
    let mut walk = EntryWalk {
        fetcher,
        entrypoint: entrypoint.clone(),
        modules: Vec::new(),
        slots: HashMap::new(),
        active: HashSet::new(),
    };
    let root = walk.visit(entrypoint).await?;
    debug!(entrypoint = %walk.entrypoint, modules = walk.modules.len(), "entrypoint walked");
    Ok((walk.modules, root.module))
}

/// State of one entrypoint's depth-first walk.
struct EntryWalk<'f, 'l, L: ?Sized> {
    fetcher: &'f ModuleFetcher<'l, L>,
    entrypoint: ModuleSpecifier,
    modules: Vec<Module>,
    slots: HashMap<ModuleSpecifier, ModuleIndex>,
    active: HashSet<ModuleSpecifier>,
}

impl<'f, 'l, L: Loader + ?Sized> EntryWalk<'f, 'l, L> {
    fn visit(&mut self, specifier: ModuleSpecifier) -> BoxFuture<'_, Result<Dependency, GraphError>> {
        async move {
            if let Some(&module) = self.slots.get(&specifier) {
                let kind = if self.active.contains(&specifier) {
                    trace!(module = %specifier, entrypoint = %self.entrypoint, "cycle back-edge");
                    DependencyKind::Cycle
                } else {
                    DependencyKind::Static
                };
                return Ok(Dependency { module, kind });
            }

            let fetched = self.fetcher.fetch(&self.entrypoint, &specifier).await?;
            let slot = ModuleIndex::from_raw(self.modules.len() as u32);
            self.modules.push(Module {
                specifier: specifier.clone(),
                entrypoint: self.entrypoint.clone(),
                content_hash: fetched.content_hash,
                module_hash: fetched.content_hash,
                dependencies: Vec::new(),
                externals: Vec::new(),
            });
            self.slots.insert(specifier.clone(), slot);
            self.active.insert(specifier.clone());

            // Warm the fetch cells of all children at once. Failures are
            // memoized and resurface in declaration order below.
            let pending = fetched
                .references
                .iter()
                .filter_map(Resolution::as_module)
                .filter(|child| !self.slots.contains_key(*child))
                .map(|child| self.fetcher.fetch(&self.entrypoint, child));
            join_all(pending).await;

            let mut dependencies = Vec::new();
            let mut externals = Vec::new();
            for reference in &fetched.references {
                match reference {
                    Resolution::Module(child) => dependencies.push(self.visit(child.clone()).await?),
                    Resolution::External(external) => externals.push(external.clone()),
                }
            }

            let module_hash = self.aggregate_hash(fetched.content_hash, &dependencies);
            let module = &mut self.modules[slot.as_usize()];
            module.module_hash = module_hash;
            module.dependencies = dependencies;
            module.externals = externals;
            self.active.remove(&specifier);

            Ok(Dependency {
                module: slot,
                kind: DependencyKind::Static,
            })
        }
        .boxed()
    }

    /// A module without dependencies hashes to its content hash. Otherwise the
    /// content hash is followed by each dependency's contribution in order.
    fn aggregate_hash(&self, content_hash: ContentHash, dependencies: &[Dependency]) -> ContentHash {
        if dependencies.is_empty() {
            return content_hash;
        }
        let mut hasher = Hasher::new();
        hasher.update(content_hash.to_string());
        for dep in dependencies {
            let target = &self.modules[dep.module.as_usize()];
            let contribution = match dep.kind {
                DependencyKind::Static => target.module_hash,
                DependencyKind::Cycle => target.content_hash,
            };
            hasher.update(contribution.to_string());
        }
        hasher.digest()
    }
}
