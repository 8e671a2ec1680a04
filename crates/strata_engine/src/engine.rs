//! The build engine.

use futures_util::future::join_all;
use strata_cache::{BuildCache, CacheStore, GenerationResult, Snapshot};
use strata_common::{ContentHash, Hasher, ModuleSpecifier};
use strata_graph::{BuildOptions, GraphBuilder, Loader, Module, ModuleGraph};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::page::{Page, Renderer};

/// Outcome of one [`Engine::build`].
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Aggregate hash of the module graph.
    pub graph_hash: ContentHash,
    /// Paths that were rendered, in page order.
    pub rendered: Vec<String>,
    /// Paths carried over from the previous run, in page order.
    pub reused: Vec<String>,
    /// Delta against the previous run.
    pub snapshot: Snapshot,
}

/// Computes the staleness key of a page.
///
/// The key combines the aggregate hash of the page's entry module with its
/// output path and route data, so it changes whenever anything the page is
/// built from changes.
pub fn page_hash(
    graph: &ModuleGraph,
    entrypoint: &ModuleSpecifier,
    page_path: &str,
    extra: &[u8],
) -> Result<ContentHash, EngineError> {
    let module = graph
        .entry_module(entrypoint)
        .ok_or_else(|| EngineError::UnknownEntrypoint(entrypoint.to_string()))?;
    Ok(staleness_key(module, page_path, extra))
}

fn staleness_key(module: &Module, page_path: &str, extra: &[u8]) -> ContentHash {
    Hasher::new()
        .update(module.module_hash.to_string())
        .update("\0")
        .update(page_path)
        .update("\0")
        .update(extra)
        .digest()
}

/// Drives graph construction, staleness checks and cache bookkeeping.
pub struct Engine<L, S> {
    loader: L,
    store: S,
    options: BuildOptions,
}

impl<L: Loader, S: CacheStore> Engine<L, S> {
    /// Creates an engine with default [`BuildOptions`].
    pub fn new(loader: L, store: S) -> Self {
        Self {
            loader,
            store,
            options: BuildOptions::default(),
        }
    }

    /// Replaces the graph build options.
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the graph build options.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Returns the loader.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Returns the cache store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Builds the module graph for `entrypoints`.
    pub async fn build_graph<E: AsRef<str>>(&self, entrypoints: &[E]) -> Result<ModuleGraph, EngineError> {
        let graph = GraphBuilder::new(&self.loader)
            .with_options(self.options.clone())
            .build(entrypoints)
            .await?;
        Ok(graph)
    }

    /// Opens the build cache, seeded from the previous run.
    pub async fn open_cache(&self) -> BuildCache<&S> {
        BuildCache::load(&self.store).await
    }

    /// Persists `cache`, drops unreferenced documents and returns the delta
    /// against the previous run.
    ///
    /// Once the state is saved the build is committed; a failed document
    /// sweep is logged and retried on the next commit.
    pub async fn commit(&self, cache: &BuildCache<&S>) -> Result<Snapshot, EngineError> {
        cache.save().await?;
        if let Err(err) = cache.collect_garbage().await {
            warn!(error = %err, "failed to collect stale documents");
        }
        Ok(Snapshot::load(&self.store).await?)
    }

    /// Runs one incremental build over `pages`.
    ///
    /// Pages whose staleness key matches the previous run are carried over
    /// without calling `renderer`. The cache is committed only if every page
    /// succeeds, so a failed build leaves the previous state intact.
    pub async fn build<R: Renderer + ?Sized>(
        &self,
        pages: &[Page],
        renderer: &R,
    ) -> Result<BuildReport, EngineError> {
        let entrypoints: Vec<&str> = pages.iter().map(|p| p.entrypoint.as_str()).collect();
        let graph = self.build_graph(entrypoints.as_slice()).await?;
        let cache = self.open_cache().await;

        let outcomes = join_all(
            pages
                .iter()
                .zip(&graph.root().children)
                .map(|(page, &entry)| self.build_page(&cache, renderer, page, graph.module(entry))),
        )
        .await;

        let mut rendered = Vec::new();
        let mut reused = Vec::new();
        for (page, outcome) in pages.iter().zip(outcomes) {
            if outcome? {
                rendered.push(page.path.clone());
            } else {
                reused.push(page.path.clone());
            }
        }

        let snapshot = self.commit(&cache).await?;
        info!(
            pages = pages.len(),
            rendered = rendered.len(),
            reused = reused.len(),
            evicted = snapshot.evicted.len(),
            "build finished"
        );
        Ok(BuildReport {
            graph_hash: graph.hash(),
            rendered,
            reused,
            snapshot,
        })
    }

    /// Returns `true` if the page was rendered.
    async fn build_page<R: Renderer + ?Sized>(
        &self,
        cache: &BuildCache<&S>,
        renderer: &R,
        page: &Page,
        module: &Module,
    ) -> Result<bool, EngineError> {
        let hash = staleness_key(module, &page.path, &page.data);
        let output = GenerationResult::new(page.path.clone(), hash);
        if cache.is_fresh(&page.path, &hash) {
            debug!(path = %page.path, "page unchanged");
            cache.add(output).await?;
            return Ok(false);
        }

        let output = renderer
            .render(page, module, output)
            .await
            .map_err(|source| EngineError::Render {
                path: page.path.clone(),
                source,
            })?;
        cache.add(output).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::future::{BoxFuture, FutureExt};
    use strata_cache::{Age, CacheError, MemoryStore, STATE_KEY};
    use strata_graph::MemoryLoader;

    use super::*;
    use crate::error::RenderError;

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl Renderer for CountingRenderer {
        fn render<'a>(
            &'a self,
            page: &'a Page,
            module: &'a Module,
            output: GenerationResult,
        ) -> BoxFuture<'a, Result<GenerationResult, RenderError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = format!("{} from {}", page.path, module.specifier);
            async move { Ok(output.with_body(body).with_header("content-type", "text/html")) }
                .boxed()
        }
    }

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render<'a>(
            &'a self,
            _page: &'a Page,
            _module: &'a Module,
            _output: GenerationResult,
        ) -> BoxFuture<'a, Result<GenerationResult, RenderError>> {
            async move { Err::<GenerationResult, RenderError>("boom".into()) }.boxed()
        }
    }

    fn site() -> MemoryLoader {
        let mut loader = MemoryLoader::new();
        loader
            .insert("file:///index.tsx", "index", ["./layout.tsx"])
            .unwrap();
        loader
            .insert("file:///about.tsx", "about", ["./layout.tsx", "npm:preact"])
            .unwrap();
        loader
            .insert("file:///layout.tsx", "layout", Vec::<String>::new())
            .unwrap();
        loader
    }

    fn pages() -> Vec<Page> {
        vec![
            Page::new("/", "./index.tsx"),
            Page::new("/about", "./about.tsx"),
        ]
    }

    #[tokio::test]
    async fn first_build_renders_everything() {
        let loader = site();
        let store = MemoryStore::new();
        let engine = Engine::new(&loader, &store);
        let renderer = CountingRenderer::default();

        let report = engine.build(&pages(), &renderer).await.unwrap();
        assert_eq!(report.rendered, vec!["/", "/about"]);
        assert!(report.reused.is_empty());
        assert_eq!(report.snapshot.added_paths(), vec!["/", "/about"]);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
        assert!(store.contains(STATE_KEY));
    }

    #[tokio::test]
    async fn unchanged_build_renders_nothing() {
        let loader = site();
        let store = MemoryStore::new();
        let engine = Engine::new(&loader, &store);
        let renderer = CountingRenderer::default();
        engine.build(&pages(), &renderer).await.unwrap();
        let puts = store.total_puts();

        let report = engine.build(&pages(), &renderer).await.unwrap();
        assert_eq!(report.reused, vec!["/", "/about"]);
        assert!(report.snapshot.is_unchanged());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
        // only the state file is rewritten
        assert_eq!(store.total_puts(), puts + 1);
    }

    #[tokio::test]
    async fn route_data_changes_the_key() {
        let loader = site();
        let store = MemoryStore::new();
        let engine = Engine::new(&loader, &store);
        let renderer = CountingRenderer::default();
        engine.build(&pages(), &renderer).await.unwrap();

        let mut next = pages();
        next[1] = next[1].clone().with_data("lang=de");
        let report = engine.build(&next, &renderer).await.unwrap();
        assert_eq!(report.rendered, vec!["/about"]);
        assert_eq!(report.reused, vec!["/"]);
    }

    #[tokio::test]
    async fn render_failure_keeps_previous_state() {
        let loader = site();
        let store = MemoryStore::new();
        let engine = Engine::new(&loader, &store);
        engine.build(&pages(), &CountingRenderer::default()).await.unwrap();
        let saved = store.get(STATE_KEY).await.unwrap();

        let mut next = pages();
        next.push(Page::new("/new", "./index.tsx"));
        let err = engine.build(&next, &FailingRenderer).await.unwrap_err();
        assert!(matches!(err, EngineError::Render { ref path, .. } if path == "/new"));
        assert_eq!(store.get(STATE_KEY).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn graph_errors_abort_before_caching() {
        let loader = site();
        let store = MemoryStore::new();
        let engine = Engine::new(&loader, &store);
        let err = engine
            .build(&[Page::new("/x", "./missing.tsx")], &CountingRenderer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Graph(_)));
        assert_eq!(store.total_puts(), 0);
    }

    #[tokio::test]
    async fn page_hash_tracks_module_hash() {
        let loader = site();
        let engine = Engine::new(&loader, MemoryStore::new());
        let graph = engine.build_graph(&["./index.tsx"]).await.unwrap();
        let index = ModuleSpecifier::parse("file:///index.tsx").unwrap();

        let a = page_hash(&graph, &index, "/", b"").unwrap();
        assert_eq!(a, page_hash(&graph, &index, "/", b"").unwrap());
        assert_ne!(a, page_hash(&graph, &index, "/index.html", b"").unwrap());
        assert_ne!(a, page_hash(&graph, &index, "/", b"v2").unwrap());

        let other = ModuleSpecifier::parse("file:///about.tsx").unwrap();
        assert!(matches!(
            page_hash(&graph, &other, "/", b""),
            Err(EngineError::UnknownEntrypoint(_))
        ));
    }

    /// A store whose key listing always fails.
    struct UnlistableStore(MemoryStore);

    impl CacheStore for UnlistableStore {
        fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, CacheError>> {
            self.0.get(key)
        }

        fn put<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<(), CacheError>> {
            self.0.put(key, value)
        }

        fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, CacheError>> {
            self.0.delete(key)
        }

        fn keys<'a>(&'a self, _prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, CacheError>> {
            async move {
                Err(CacheError::Io {
                    path: "documents".into(),
                    source: std::io::Error::other("listing unavailable"),
                })
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn failed_sweep_does_not_fail_commit() {
        let loader = site();
        let engine = Engine::new(&loader, UnlistableStore(MemoryStore::new()));
        let report = engine.build(&pages(), &CountingRenderer::default()).await.unwrap();
        assert_eq!(report.snapshot.added_paths(), vec!["/", "/about"]);
        assert!(engine.store().0.contains(STATE_KEY));
    }

    #[tokio::test]
    async fn commit_reports_delta() {
        let loader = site();
        let store = MemoryStore::new();
        let engine = Engine::new(&loader, &store);
        let cache = engine.open_cache().await;
        let age = cache
            .add(GenerationResult::new("/a", ContentHash::from_bytes(b"a")).with_body("a"))
            .await
            .unwrap();
        assert_eq!(age, Age::New);
        let snapshot = engine.commit(&cache).await.unwrap();
        assert_eq!(snapshot.added_paths(), vec!["/a"]);
    }
}
