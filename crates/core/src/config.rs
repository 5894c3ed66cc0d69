//! Settings for locating and rendering stylesheets.
//!
//! Settings are plain JSON:
//!
//! ```json
//! {
//!   "transforms": "site/transforms",
//!   "page_pattern": "{namespace}{page}.xslt",
//!   "default_namespace": "blog/",
//!   "debug": false,
//!   "renderers": { "markdown": "blog.renderers.markdown" }
//! }
//! ```
//!
//! Every field is optional. `XDJANGO_DEBUG` and `XDJANGO_TRANSFORMS` override the file
//! when [`Settings::with_env_overrides`] is applied.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PAGE_PATTERN: &str = "{namespace}{page}.xslt";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The directory stylesheets and their imports are loaded from.
    pub transforms: PathBuf,
    /// How a page name becomes a stylesheet path. `{page}` and `{namespace}` are
    /// substituted.
    pub page_pattern: String,
    pub default_namespace: String,
    /// Render failures as an HTML error page and parse failures as error lists.
    pub debug: bool,
    /// Renderer keys mapped to the dotted paths they are registered under.
    pub renderers: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transforms: PathBuf::from("transforms"),
            page_pattern: DEFAULT_PAGE_PATTERN.to_string(),
            default_namespace: String::new(),
            debug: false,
            renderers: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Applies `XDJANGO_DEBUG` and `XDJANGO_TRANSFORMS` from the environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var("XDJANGO_DEBUG").ok().as_deref(),
            std::env::var("XDJANGO_TRANSFORMS").ok().as_deref(),
        )
    }

    fn with_overrides(mut self, debug: Option<&str>, transforms: Option<&str>) -> Self {
        if let Some(debug) = debug {
            self.debug = matches!(debug.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(transforms) = transforms.filter(|t| !t.is_empty()) {
            self.transforms = PathBuf::from(transforms);
        }
        self
    }

    /// The stylesheet path for `page`, relative to [`Settings::transforms`].
    /// `namespace` falls back to [`Settings::default_namespace`].
    pub fn page_path(&self, page: &str, namespace: Option<&str>) -> String {
        self.page_pattern
            .replace("{namespace}", namespace.unwrap_or(&self.default_namespace))
            .replace("{page}", page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings = Settings::from_json_str(r#"{"debug": true}"#).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.page_pattern, DEFAULT_PAGE_PATTERN);
        assert_eq!(settings.transforms, PathBuf::from("transforms"));
        assert!(settings.renderers.is_empty());
    }

    #[test]
    fn test_renderer_paths() {
        let settings =
            Settings::from_json_str(r#"{"renderers": {"markdown": "blog.renderers.markdown"}}"#).unwrap();
        assert_eq!(settings.renderers["markdown"], "blog.renderers.markdown");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Settings::from_json_str(r#"{"debug": "sometimes"}"#),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn test_page_path() {
        let settings = Settings {
            default_namespace: "blog/".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.page_path("index", None), "blog/index.xslt");
        assert_eq!(settings.page_path("index", Some("")), "index.xslt");
        assert_eq!(settings.page_path("about", Some("site/")), "site/about.xslt");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::default().with_overrides(Some("true"), Some("/srv/transforms"));
        assert!(settings.debug);
        assert_eq!(settings.transforms, PathBuf::from("/srv/transforms"));

        let settings = settings.with_overrides(Some("0"), Some(""));
        assert!(!settings.debug);
        assert_eq!(settings.transforms, PathBuf::from("/srv/transforms"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"page_pattern": "{page}.xsl"}"#).unwrap();
        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.page_path("home", None), "home.xsl");
        assert!(matches!(
            Settings::from_file(dir.path().join("absent.json")),
            Err(SettingsError::Io { .. })
        ));
    }
}
