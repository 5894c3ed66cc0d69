//! Rendering stylesheets from the configured transforms directory.

use crate::error::XdjangoError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use xdjango_core::{
    ContextValue, Input, RendererCatalog, Settings, TemplateContext, TransformError, Transformer,
    TransformerBuilder,
};
use xdjango_resource::FilesystemResourceProvider;
use xdjango_traits::ResourceProvider;

/// A stylesheet identified by path parts under the transforms directory.
///
/// `TransformerFile::new(["blog", "post.xslt"])` names `blog/post.xslt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerFile {
    path: String,
}

impl TransformerFile {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = parts
            .into_iter()
            .flat_map(|part| {
                part.as_ref()
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .join("/");
        Self { path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Loads and compiles the stylesheet. Imports resolve relative to it within the
    /// transforms directory.
    pub fn compile(
        &self,
        settings: &Settings,
        catalog: Arc<RendererCatalog>,
    ) -> Result<Transformer, TransformError> {
        let provider = Arc::new(FilesystemResourceProvider::new(&settings.transforms));
        let source = provider
            .load_text(&self.path)
            .map_err(|e| TransformError::from(e).in_stylesheet(&self.path))?;
        TransformerBuilder::from_settings(settings, catalog)
            .with_resource_provider(provider)
            .with_base_uri(&self.path)
            .build(&source)
            .map_err(|e| e.in_stylesheet(&self.path))
    }
}

/// Compiles `stylesheet` from `settings.transforms` and renders it once against the
/// `<empty/>` document.
pub fn render_to_string(
    settings: &Settings,
    stylesheet: &str,
    context: TemplateContext,
) -> Result<String, XdjangoError> {
    let file = TransformerFile::new([stylesheet]);
    let transformer = file.compile(settings, Arc::new(RendererCatalog::new()))?;
    transformer
        .render(context)
        .map_err(|e| XdjangoError::Transform(e.in_stylesheet(file.path())))
}

/// Renders pages from the transforms directory, compiling each stylesheet once.
#[derive(Debug)]
pub struct PageRenderer {
    settings: Settings,
    catalog: Arc<RendererCatalog>,
    transformers: RwLock<HashMap<String, Arc<Transformer>>>,
}

impl PageRenderer {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            catalog: Arc::new(RendererCatalog::new()),
            transformers: RwLock::new(HashMap::new()),
        }
    }

    /// The catalog configured renderer paths are resolved through.
    pub fn with_catalog(mut self, catalog: Arc<RendererCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<RendererCatalog> {
        &self.catalog
    }

    /// The compiled stylesheet at `path`, compiling it on first use.
    pub fn transformer(&self, path: &str) -> Result<Arc<Transformer>, TransformError> {
        let file = TransformerFile::new([path]);
        if let Ok(cache) = self.transformers.read()
            && let Some(transformer) = cache.get(file.path())
        {
            return Ok(Arc::clone(transformer));
        }

        let transformer = Arc::new(file.compile(&self.settings, Arc::clone(&self.catalog))?);
        if let Ok(mut cache) = self.transformers.write() {
            cache
                .entry(file.path().to_string())
                .or_insert_with(|| Arc::clone(&transformer));
        }
        Ok(transformer)
    }

    /// Renders `stylesheet` against `input`.
    pub fn render<'i>(
        &self,
        stylesheet: &str,
        input: impl Into<Input<'i>>,
        context: TemplateContext,
        params: &HashMap<String, String>,
    ) -> Result<String, XdjangoError> {
        let transformer = self.transformer(stylesheet)?;
        transformer
            .execute(input, context, params)
            .map_err(|e| XdjangoError::Transform(e.in_stylesheet(stylesheet)))
    }

    pub fn render_to_string(&self, stylesheet: &str, context: TemplateContext) -> Result<String, XdjangoError> {
        self.render(stylesheet, Input::Empty, context, &HashMap::new())
    }

    /// Renders the page `name`. The stylesheet path comes from the page pattern, and
    /// `extra` is merged over `context`.
    pub fn page<K, V>(
        &self,
        name: &str,
        namespace: Option<&str>,
        mut context: TemplateContext,
        extra: impl IntoIterator<Item = (K, V)>,
    ) -> Result<String, XdjangoError>
    where
        K: Into<String>,
        V: Into<ContextValue>,
    {
        let path = self.settings.page_path(name, namespace);
        log::info!(target: "xdjango::pages", "Rendering page '{}' from {}", name, path);
        context.update(extra);
        self.render_to_string(&path, context)
    }

    /// Number of compiled stylesheets held.
    pub fn cached(&self) -> usize {
        self.transformers.read().map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transformer_file_joins_parts() {
        assert_eq!(TransformerFile::new(["blog", "post.xslt"]).path(), "blog/post.xslt");
        assert_eq!(TransformerFile::new(["blog/", "/post.xslt"]).path(), "blog/post.xslt");
        assert_eq!(TransformerFile::new(["a//b", "c.xslt"]).path(), "a/b/c.xslt");
    }

    #[test]
    fn test_missing_stylesheet_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            transforms: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let err = TransformerFile::new(["nowhere.xslt"])
            .compile(&settings, Arc::new(RendererCatalog::new()))
            .unwrap_err();
        assert!(matches!(err, TransformError::Stylesheet { ref path, .. } if path == "nowhere.xslt"));
    }
}
