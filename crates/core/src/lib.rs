//! # xdjango-core
//!
//! Binds XSLT 1.0 stylesheets to Django-style template contexts.
//!
//! A stylesheet reads context values by calling them as extension functions in the
//! `http://djangoproject.com/template/xslt` namespace:
//!
//! ```xml
//! <xsl:value-of select="xdjango:greet()"/>          <!-- the value as a string -->
//! <xsl:value-of select="xdjango:greet.upper()"/>    <!-- a dotted lookup -->
//! <xsl:copy-of select="xdjango:body('parse')"/>     <!-- through the parse renderer -->
//! <a href="{xdjango:root()}/about"/>                <!-- inside an attribute value template -->
//! ```
//!
//! The crate is organised around the pieces of that binding:
//! - **scanner**: finds the calls a stylesheet and its imports make, before compilation
//! - **registry** / **dispatcher**: one dispatcher per called context name
//! - **renderer**: the `xml`, `parse` and `parsehtml` renderers plus configured ones
//! - **queryset**: the `<xdjango:queryset>` row iteration element
//! - **serializer** / **query**: records and queries exposed as XML documents
//! - **transformer**: compiles stylesheets and runs them against a context

// Re-export engine crates
pub use xdjango_traits as traits;
pub use xdjango_xpath1 as xpath;
pub use xdjango_xslt as xslt;

mod binding;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod filters;
pub mod html;
pub mod query;
pub mod queryset;
pub mod registry;
pub mod renderer;
pub mod scanner;
pub mod serializer;
pub mod testhelp;
pub mod transformer;

/// The namespace context functions and extension elements live in.
pub const XDJANGO_NAMESPACE: &str = "http://djangoproject.com/template/xslt";

pub use config::{Settings, SettingsError};
pub use context::{ContextObject, ContextValue, TemplateContext};
pub use dispatcher::ContextFunction;
pub use error::{RenderError, ResolveError, SerializeError, TransformError};
pub use query::{QuerySource, RenderableQuery, RenderingManager, xmlify};
pub use registry::ContextFunctionRegistry;
pub use renderer::{BuiltinRenderer, Renderer, RendererCatalog, RendererTable};
pub use serializer::{
    ElementBuilder, FieldMap, FieldRef, IterRecords, Record, RecordSource, Row, XmlSerializer,
    xmlify_iter,
};
pub use transformer::{Input, Transformer, TransformerBuilder, TransformerHook};
