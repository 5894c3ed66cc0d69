//! XSLT 1.0 processor for the xdjango workspace.
//!
//! Stylesheets are compiled by [`XsltParser`] into an [`XsltTemplate`], which transforms
//! [`xdjango_xpath1::Node`] trees. Hosts plug in through three seams: extension-function
//! namespaces ([`FunctionNamespace`]), extension elements ([`ExtensionElements`]) and
//! document resolvers ([`DocumentResolver`]).

pub mod ast;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod extension;
pub mod output;
pub mod parser;
pub mod pattern;
pub mod processor;
pub mod resolver;
pub mod util;

mod compiler_handlers;
mod executor_handlers;

pub use ast::XSLT_NAMESPACE;
pub use error::{Location, XsltError};
pub use executor::ExecutionError;
pub use extension::{
    ExtensionCall, ExtensionElements, Extensions, FunctionNamespace, FunctionNamespaces,
};
pub use output::OutputBuilder;
pub use processor::{XsltParser, XsltTemplate};
pub use resolver::{DocumentResolver, ResolvedDocument, ResourceResolver, resolve_uri, uri_scheme};
