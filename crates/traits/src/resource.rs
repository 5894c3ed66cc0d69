//! ResourceProvider trait for abstracting where stylesheets come from.
//!
//! Transformers load their stylesheet, and every document it imports or includes,
//! through a provider, so the same code runs against a transforms directory on disk or
//! against stylesheets registered in memory.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to load resource '{path}': {message}")]
    LoadFailed { path: String, message: String },

    #[error("Invalid resource format: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::Io(err.to_string())
    }
}

/// Shared resource data type (reference-counted bytes).
pub type SharedResourceData = Arc<Vec<u8>>;

/// A source of named resources: stylesheets, imported sub-documents and input documents.
///
/// # Implementations
///
/// - `FilesystemResourceProvider` (xdjango-resource): a transforms directory on disk
/// - [`InMemoryResourceProvider`]: resources registered up front
pub trait ResourceProvider: Send + Sync + Debug {
    /// Load a resource by its path, relative to the provider's base.
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError>;

    /// Load a resource that must be UTF-8 text.
    fn load_text(&self, path: &str) -> Result<String, ResourceError> {
        let data = self.load(path)?;
        String::from_utf8(data.to_vec())
            .map_err(|e| ResourceError::InvalidFormat(format!("'{}' is not UTF-8: {}", path, e)))
    }

    /// Check if a resource exists.
    fn exists(&self, path: &str) -> bool;

    /// Get the base path for resolving relative resources.
    ///
    /// Returns `None` if the provider doesn't use path-based resolution.
    fn base_path(&self) -> Option<&str> {
        None
    }

    /// Returns a human-readable name for this provider (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// An in-memory resource provider.
///
/// Resources are stored in memory and must be registered before use.
#[derive(Debug, Default)]
pub struct InMemoryResourceProvider {
    resources: RwLock<HashMap<String, SharedResourceData>>,
}

impl InMemoryResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the in-memory store, replacing any resource at the same path.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::LoadFailed` if the internal lock is poisoned.
    pub fn add(&self, path: impl Into<String>, data: Vec<u8>) -> Result<(), ResourceError> {
        self.add_shared(path, Arc::new(data))
    }

    /// Add a text resource, typically a stylesheet.
    pub fn add_text(&self, path: impl Into<String>, text: &str) -> Result<(), ResourceError> {
        self.add(path, text.as_bytes().to_vec())
    }

    /// Add a resource from shared data.
    pub fn add_shared(
        &self,
        path: impl Into<String>,
        data: SharedResourceData,
    ) -> Result<(), ResourceError> {
        let path_string = path.into();
        let mut resources = self
            .resources
            .write()
            .map_err(|_| ResourceError::LoadFailed {
                path: path_string.clone(),
                message: "resource store lock poisoned".to_string(),
            })?;
        resources.insert(path_string, data);
        Ok(())
    }

    /// Remove a resource from the store.
    ///
    /// Returns `None` if the lock is poisoned or the resource doesn't exist.
    pub fn remove(&self, path: &str) -> Option<SharedResourceData> {
        self.resources.write().ok()?.remove(path)
    }

    /// Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.resources.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceProvider for InMemoryResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let resources = self
            .resources
            .read()
            .map_err(|_| ResourceError::LoadFailed {
                path: path.to_string(),
                message: "resource store lock poisoned".to_string(),
            })?;
        resources
            .get(path)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.resources
            .read()
            .map(|r| r.contains_key(path))
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "InMemoryResourceProvider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_provider_add_and_load() {
        let provider = InMemoryResourceProvider::new();
        provider.add_text("pages/home.xslt", "<xsl:stylesheet/>").unwrap();

        let text = provider.load_text("pages/home.xslt").unwrap();
        assert_eq!(text, "<xsl:stylesheet/>");
        assert!(provider.exists("pages/home.xslt"));
    }

    #[test]
    fn test_in_memory_provider_not_found() {
        let provider = InMemoryResourceProvider::new();
        let result = provider.load("nonexistent.xslt");
        assert!(matches!(result, Err(ResourceError::NotFound(_))));
    }

    #[test]
    fn test_in_memory_provider_overwrite_and_remove() {
        let provider = InMemoryResourceProvider::new();
        provider.add("a.xslt", b"original".to_vec()).unwrap();
        provider.add("a.xslt", b"updated".to_vec()).unwrap();
        assert_eq!(&*provider.load("a.xslt").unwrap(), b"updated");
        assert_eq!(provider.len(), 1);

        assert!(provider.remove("a.xslt").is_some());
        assert!(provider.is_empty());
        assert!(provider.remove("a.xslt").is_none());
    }

    #[test]
    fn test_load_text_rejects_invalid_utf8() {
        let provider = InMemoryResourceProvider::new();
        provider.add("bad.xslt", vec![0xff, 0xfe]).unwrap();
        let err = provider.load_text("bad.xslt").unwrap_err();
        assert!(matches!(err, ResourceError::InvalidFormat(_)));
    }

    #[test]
    fn test_resource_error_display() {
        let err = ResourceError::LoadFailed {
            path: "file.xslt".to_string(),
            message: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("file.xslt"));
        assert!(err.to_string().contains("permission denied"));
    }
}
