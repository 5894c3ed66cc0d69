//! Loads stylesheets from a transforms directory.
//!
//! Every path is resolved under the base directory. Paths that would leave it, through
//! `..` components or by being absolute, are reported as not found.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use xdjango_traits::{ResourceError, ResourceProvider, SharedResourceData};

#[derive(Debug)]
pub struct FilesystemResourceProvider {
    base_path: PathBuf,
    /// Canonicalized base path for containment checks
    canonical_base: Option<PathBuf>,
}

impl FilesystemResourceProvider {
    /// A provider rooted at `base_path`, usually the configured transforms directory.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        let base = base_path.as_ref().to_path_buf();
        // The directory may not exist yet; containment then falls back to a lexical check.
        let canonical = base.canonicalize().ok();
        Self {
            base_path: base,
            canonical_base: canonical,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base_path
    }

    /// Resolves `path` under the base directory, or `None` if it would escape it.
    fn resolve_path_safe(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute() {
            return None;
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return None;
        }

        let full_path = self.base_path.join(relative);
        if let Ok(canonical) = full_path.canonicalize()
            && let Some(base) = &self.canonical_base
        {
            // Symlinks may still point outside the base.
            return canonical.starts_with(base).then_some(canonical);
        }
        Some(full_path)
    }
}

impl ResourceProvider for FilesystemResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let full_path = self.resolve_path_safe(path).ok_or_else(|| {
            log::warn!("Refusing to load '{}' from outside {:?}", path, self.base_path);
            ResourceError::NotFound(format!("{} (outside the transforms directory)", path))
        })?;

        log::debug!("Loading {:?}", full_path);
        std::fs::read(&full_path).map(Arc::new).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound(full_path.display().to_string())
            } else {
                ResourceError::LoadFailed {
                    path: full_path.display().to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve_path_safe(path).is_some_and(|p| p.is_file())
    }

    fn base_path(&self) -> Option<&str> {
        self.base_path.to_str()
    }

    fn name(&self) -> &'static str {
        "FilesystemResourceProvider"
    }
}
