//! Error types for context lookup, rendering, serialization and the transform pipeline.

use thiserror::Error;
use xdjango_traits::ResourceError;
use xdjango_xpath1::XPathError;
use xdjango_xslt::{ExecutionError, XsltError};

/// A dotted context lookup that could not be completed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("'{path}' cannot be resolved: no '{segment}'")]
    Missing { path: String, segment: String },

    #[error("method '{method}' failed: {message}")]
    Method { method: String, message: String },

    #[error("'{0}' is not iterable")]
    NotIterable(String),

    #[error("a template context must be built from a mapping, got {0}")]
    NotAMapping(String),
}

#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("unknown renderer '{0}'")]
    UnknownRenderer(String),

    #[error("renderer '{path}' could not be resolved: {message}")]
    Unresolved { path: String, message: String },

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    XPath(#[from] XPathError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl RenderError {
    /// Short name of the variant, reported alongside the message when a dispatch fails.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::UnknownRenderer(_) => "UnknownRenderer",
            RenderError::Unresolved { .. } => "Unresolved",
            RenderError::Failed(_) => "Failed",
            RenderError::XPath(_) => "XPath",
            RenderError::Resolve(_) => "Resolve",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum SerializeError {
    #[error("record source failed: {0}")]
    Source(String),

    #[error("invalid field reference '{field}': {message}")]
    Field { field: String, message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    XPath(#[from] XPathError),
}

/// Failures surfaced by the transform orchestrator.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("stylesheet compilation failed: {0}")]
    Compile(#[from] XsltError),

    #[error("transformation failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("input document could not be parsed: {0}")]
    Input(XPathError),

    #[error("stylesheet '{path}': {source}")]
    Stylesheet {
        path: String,
        #[source]
        source: Box<TransformError>,
    },

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("output could not be serialized: {0}")]
    Output(String),
}

impl TransformError {
    /// Attaches the stylesheet path to an error raised while loading or running it.
    pub fn in_stylesheet(self, path: impl Into<String>) -> Self {
        TransformError::Stylesheet {
            path: path.into(),
            source: Box::new(self),
        }
    }
}
