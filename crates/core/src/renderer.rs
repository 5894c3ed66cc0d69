//! Renderers turn a context value into something an XPath expression can use.
//!
//! A stylesheet picks a renderer with the first argument of a context call:
//! `xdjango:body('parse')` parses the value as XML, `xdjango:name('xml', 'x', 'h1')`
//! wraps it in an `<h1>`. Three renderers are built in. Applications add their own either as
//! callables or as dotted paths that are looked up in a [`RendererCatalog`] the first time
//! they are used.

use crate::context::ContextValue;
use crate::error::RenderError;
use crate::html::parse_html;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use xdjango_xpath1::{DocumentBuilder, Node, QName, XPathValue, parse_document};

/// A renderer callable: the resolved context value and the call's remaining arguments,
/// already reduced to strings.
pub type RenderFn = dyn Fn(&ContextValue, &[String]) -> Result<XPathValue, RenderError> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinRenderer {
    /// Wraps the value in an element, `div` unless a tag is given.
    Xml,
    /// Parses the value as an XML document.
    Parse,
    /// Parses the value as HTML into an XHTML document.
    ParseHtml,
}

impl BuiltinRenderer {
    pub const ALL: [(&'static str, BuiltinRenderer); 3] = [
        ("xml", BuiltinRenderer::Xml),
        ("parse", BuiltinRenderer::Parse),
        ("parsehtml", BuiltinRenderer::ParseHtml),
    ];

    pub fn render(
        self,
        value: &ContextValue,
        args: &[String],
        verbose: bool,
    ) -> Result<XPathValue, RenderError> {
        let text = value.to_string();
        match self {
            BuiltinRenderer::Xml => {
                // args[0] is ignored; the tag is the second argument after the key
                let tag = args.get(1).map(String::as_str).unwrap_or("div");
                if !is_xml_name(tag) {
                    return Err(RenderError::Failed(format!("'{}' is not a valid element name", tag)));
                }
                Ok(text_element(tag, &text).into())
            }
            BuiltinRenderer::Parse => {
                if text.is_empty() {
                    return Ok(empty_element().into());
                }
                parsed_or_soft_failure(parse_document(&text), verbose)
            }
            BuiltinRenderer::ParseHtml => {
                if text.is_empty() {
                    return Ok(empty_element().into());
                }
                parsed_or_soft_failure(parse_html(&text), verbose)
            }
        }
    }
}

fn parsed_or_soft_failure(
    parsed: Result<Node, xdjango_xpath1::XPathError>,
    verbose: bool,
) -> Result<XPathValue, RenderError> {
    match parsed {
        Ok(root) => Ok(XPathValue::NodeSet(root.document_element().into_iter().collect())),
        Err(e) => {
            log::error!(target: "xdjango::renderer", "parse failed: {}", e);
            if verbose {
                Ok(error_list(&[e.to_string()]).into())
            } else {
                Ok(XPathValue::String(String::new()))
            }
        }
    }
}

/// One entry of a [`RendererTable`].
pub enum Renderer {
    Builtin(BuiltinRenderer),
    Direct(Arc<RenderFn>),
    /// A dotted path, resolved through the table's catalog on first use and cached.
    Deferred {
        path: String,
        resolved: OnceCell<Arc<RenderFn>>,
    },
}

impl Renderer {
    pub fn direct<F>(f: F) -> Self
    where
        F: Fn(&ContextValue, &[String]) -> Result<XPathValue, RenderError> + Send + Sync + 'static,
    {
        Renderer::Direct(Arc::new(f))
    }

    pub fn deferred(path: impl Into<String>) -> Self {
        Renderer::Deferred {
            path: path.into(),
            resolved: OnceCell::new(),
        }
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Renderer::Builtin(builtin) => f.debug_tuple("Builtin").field(builtin).finish(),
            Renderer::Direct(_) => f.write_str("Direct(..)"),
            Renderer::Deferred { path, resolved } => f
                .debug_struct("Deferred")
                .field("path", path)
                .field("resolved", &resolved.get().is_some())
                .finish(),
        }
    }
}

/// Callables addressable by dotted path, the targets of deferred renderers.
#[derive(Default)]
pub struct RendererCatalog {
    entries: RwLock<HashMap<String, Arc<RenderFn>>>,
}

impl RendererCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, path: impl Into<String>, f: F)
    where
        F: Fn(&ContextValue, &[String]) -> Result<XPathValue, RenderError> + Send + Sync + 'static,
    {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(path.into(), Arc::new(f));
        }
    }

    pub fn lookup(&self, path: &str) -> Result<Arc<RenderFn>, RenderError> {
        let entries = self.entries.read().map_err(|_| RenderError::Unresolved {
            path: path.to_string(),
            message: "catalog lock poisoned".to_string(),
        })?;
        entries.get(path).cloned().ok_or_else(|| RenderError::Unresolved {
            path: path.to_string(),
            message: "no such renderer in the catalog".to_string(),
        })
    }
}

impl fmt::Debug for RendererCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<String> = self
            .entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("RendererCatalog").field("paths", &paths).finish()
    }
}

/// The renderers a dispatcher can reach, keyed by the name used in stylesheets.
#[derive(Debug)]
pub struct RendererTable {
    renderers: HashMap<String, Renderer>,
    catalog: Arc<RendererCatalog>,
    verbose: bool,
}

impl Default for RendererTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererTable {
    /// A table holding only the built-in renderers.
    pub fn new() -> Self {
        let renderers = BuiltinRenderer::ALL
            .iter()
            .map(|(key, builtin)| (key.to_string(), Renderer::Builtin(*builtin)))
            .collect();
        Self {
            renderers,
            catalog: Arc::new(RendererCatalog::new()),
            verbose: false,
        }
    }

    /// Merges configured dotted paths over the built-ins; configuration wins.
    pub fn from_paths<'p>(
        paths: impl IntoIterator<Item = (&'p String, &'p String)>,
        catalog: Arc<RendererCatalog>,
    ) -> Self {
        let mut table = Self::new().with_catalog(catalog);
        for (key, path) in paths {
            table.insert(key.clone(), Renderer::deferred(path.clone()));
        }
        table
    }

    pub fn with_catalog(mut self, catalog: Arc<RendererCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// In verbose mode parse failures render as a list of errors instead of `""`.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn insert(&mut self, key: impl Into<String>, renderer: Renderer) {
        self.renderers.insert(key.into(), renderer);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.renderers.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Renderer> {
        self.renderers.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.renderers.keys().map(String::as_str)
    }

    /// Runs the renderer registered under `key`.
    pub fn render(
        &self,
        key: &str,
        value: &ContextValue,
        args: &[String],
    ) -> Result<XPathValue, RenderError> {
        match self.get(key) {
            None => Err(RenderError::UnknownRenderer(key.to_string())),
            Some(Renderer::Builtin(builtin)) => builtin.render(value, args, self.verbose),
            Some(Renderer::Direct(f)) => f(value, args),
            Some(Renderer::Deferred { path, resolved }) => {
                let f = resolved.get_or_try_init(|| {
                    log::debug!(target: "xdjango::renderer", "Resolving renderer '{}' from '{}'", key, path);
                    self.catalog.lookup(path)
                })?;
                f(value, args)
            }
        }
    }
}

pub(crate) fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// `<tag>text</tag>` as the document element of a new document.
pub(crate) fn text_element(tag: &str, text: &str) -> Node {
    let mut builder = DocumentBuilder::new();
    builder.start_element(QName::local(tag));
    builder.text(text);
    builder.end_element();
    let root = builder.finish();
    root.document_element().unwrap_or(root)
}

/// The `<empty/>` placeholder document element.
pub fn empty_element() -> Node {
    let mut builder = DocumentBuilder::new();
    builder.start_element(QName::local("empty"));
    builder.end_element();
    let root = builder.finish();
    root.document_element().unwrap_or(root)
}

/// `<ol><li>message</li>...</ol>`, how verbose mode reports parse failures.
pub(crate) fn error_list(messages: &[String]) -> Node {
    let mut builder = DocumentBuilder::new();
    builder.start_element(QName::local("ol"));
    for message in messages {
        builder.start_element(QName::local("li"));
        builder.text(message);
        builder.end_element();
    }
    builder.end_element();
    let root = builder.finish();
    root.document_element().unwrap_or(root)
}
