//! Pages and the rendering seam.

use futures_util::future::BoxFuture;
use strata_cache::GenerationResult;
use strata_graph::Module;

use crate::error::RenderError;

/// One output to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Output path, e.g. `/blog/hello`.
    pub path: String,
    /// Entrypoint specifier the page is rendered from.
    pub entrypoint: String,
    /// Route data that affects the output but lives outside the module graph.
    pub data: Vec<u8>,
}

impl Page {
    /// Creates a page with no route data.
    pub fn new(path: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entrypoint: entrypoint.into(),
            data: Vec::new(),
        }
    }

    /// Attaches route data.
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }
}

/// Produces the body, headers and status of a stale page.
///
/// The engine calls this only for pages whose staleness key changed since the
/// previous run. `output` arrives with the page's path and key filled in.
pub trait Renderer: Send + Sync {
    /// Renders `page` from its entry `module`.
    fn render<'a>(
        &'a self,
        page: &'a Page,
        module: &'a Module,
        output: GenerationResult,
    ) -> BoxFuture<'a, Result<GenerationResult, RenderError>>;
}

impl<T: Renderer + ?Sized> Renderer for &T {
    fn render<'a>(
        &'a self,
        page: &'a Page,
        module: &'a Module,
        output: GenerationResult,
    ) -> BoxFuture<'a, Result<GenerationResult, RenderError>> {
        (**self).render(page, module, output)
    }
}
