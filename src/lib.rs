//! # xdjango
//!
//! Renders XSLT stylesheets against Django-style template contexts.
//!
//! The binding itself lives in [`xdjango_core`]; this crate adds the pieces an
//! application uses to render pages from a transforms directory:
//!
//! ```no_run
//! use xdjango::{PageRenderer, Settings, TemplateContext};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), xdjango::XdjangoError> {
//! let renderer = PageRenderer::new(Settings::from_file("settings.json")?.with_env_overrides());
//! let context = TemplateContext::from_json(json!({"greet": "hello world"}))?;
//! let html = renderer.page("index", None, context, [("user", "ann")])?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod pages;

pub use error::XdjangoError;
pub use pages::{PageRenderer, TransformerFile, render_to_string};

pub use xdjango_core::{
    ContextFunction, ContextFunctionRegistry, ContextObject, ContextValue, ElementBuilder, FieldMap,
    Input, QuerySource, Record, RenderError, RenderableQuery, Renderer, RendererCatalog, RendererTable,
    RenderingManager, ResolveError, SerializeError, Settings, SettingsError, TemplateContext,
    TransformError, Transformer, TransformerBuilder, TransformerHook, XDJANGO_NAMESPACE,
    XmlSerializer, xmlify, xmlify_iter,
};
pub use xdjango_core::testhelp;

// Re-export engine crates
pub use xdjango_xpath1 as xpath;
pub use xdjango_xslt as xslt;
