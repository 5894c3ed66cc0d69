use thiserror::Error;
use xdjango_core::{ResolveError, SettingsError, TransformError};

/// Errors from loading settings, contexts and stylesheets, and from rendering pages.
#[derive(Error, Debug)]
pub enum XdjangoError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Rendering failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Invalid template context: {0}")]
    Context(#[from] ResolveError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
