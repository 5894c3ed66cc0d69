//! Loading of the documents a stylesheet pulls in with `xsl:import` and `xsl:include`.
//!
//! Resolvers are consulted in a chain: each either loads the document, declines it by
//! returning `Ok(None)` so the next resolver gets a turn, or fails the compilation.

use crate::error::XsltError;
use std::path::Path;
use std::sync::Arc;
use xdjango_traits::ResourceProvider;

/// Nested imports deeper than this are assumed to be a cycle the URI check missed.
pub const MAX_IMPORT_DEPTH: usize = 100;

/// A loaded sub-document and the URI it was loaded from, which becomes the base for the
/// document's own imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    pub uri: String,
    pub text: String,
}

pub trait DocumentResolver: Send + Sync {
    fn resolve(
        &self,
        href: &str,
        base_uri: Option<&str>,
    ) -> Result<Option<ResolvedDocument>, XsltError>;
}

/// Resolves hrefs against the base URI and loads them from a [`ResourceProvider`].
/// Hrefs carrying a URI scheme other than `file` are declined.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    resource_provider: Arc<dyn ResourceProvider>,
}

impl ResourceResolver {
    pub fn new(resource_provider: Arc<dyn ResourceProvider>) -> Self {
        Self { resource_provider }
    }
}

impl DocumentResolver for ResourceResolver {
    fn resolve(
        &self,
        href: &str,
        base_uri: Option<&str>,
    ) -> Result<Option<ResolvedDocument>, XsltError> {
        let uri = resolve_uri(href, base_uri);
        let path = match uri_scheme(&uri) {
            None => uri.as_str(),
            Some("file") => uri.trim_start_matches("file://"),
            Some(scheme) => {
                log::debug!(
                    "{} declines '{}': unsupported scheme '{}'",
                    self.resource_provider.name(),
                    uri,
                    scheme
                );
                return Ok(None);
            }
        };

        let bytes = self.resource_provider.load(path)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| XsltError::import(&uri, format!("Invalid UTF-8: {}", e)))?
            .to_string();
        Ok(Some(ResolvedDocument { uri, text }))
    }
}

/// The scheme of an absolute URI (`http` in `http://host/x.xsl`), if it has one.
pub fn uri_scheme(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    // A single letter is a Windows drive, not a scheme.
    (valid && scheme.len() > 1).then_some(scheme)
}

pub fn resolve_uri(href: &str, base_uri: Option<&str>) -> String {
    if href.starts_with('/') || uri_scheme(href).is_some() {
        return href.to_string();
    }

    match base_uri {
        Some(base) => {
            let base_path = Path::new(base);
            let base_dir = base_path.parent().unwrap_or(Path::new(""));
            let resolved = base_dir.join(href);
            normalize_path(&resolved.to_string_lossy())
        }
        None => normalize_path(href),
    }
}

fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    if path.starts_with('/') {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdjango_traits::InMemoryResourceProvider;

    #[test]
    fn test_resolve_uri_absolute() {
        assert_eq!(resolve_uri("/absolute/path.xsl", None), "/absolute/path.xsl");
        assert_eq!(
            resolve_uri("http://example.com/style.xsl", Some("pages/home.xslt")),
            "http://example.com/style.xsl"
        );
    }

    #[test]
    fn test_resolve_uri_relative() {
        assert_eq!(
            resolve_uri("utils.xsl", Some("/templates/main.xsl")),
            "/templates/utils.xsl"
        );
        assert_eq!(
            resolve_uri("../common/base.xsl", Some("/templates/main.xsl")),
            "/common/base.xsl"
        );
        assert_eq!(resolve_uri("base.xslt", Some("pages/home.xslt")), "pages/base.xslt");
        assert_eq!(resolve_uri("./relative.xsl", None), "relative.xsl");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/b/../c"), "/a/c");
        assert_eq!(normalize_path("/a/./b/c"), "/a/b/c");
        assert_eq!(normalize_path("a/b/../c"), "a/c");
    }

    #[test]
    fn test_uri_scheme() {
        assert_eq!(uri_scheme("http://example.com/a.xsl"), Some("http"));
        assert_eq!(uri_scheme("django:base.xslt"), Some("django"));
        assert_eq!(uri_scheme("querydirect:/people"), Some("querydirect"));
        assert_eq!(uri_scheme("c:/styles/a.xsl"), None);
        assert_eq!(uri_scheme("pages/home.xslt"), None);
    }

    #[test]
    fn test_resource_resolver_loads_relative_to_base() {
        let provider = Arc::new(InMemoryResourceProvider::new());
        provider
            .add("pages/base.xslt", b"<xsl:stylesheet/>".to_vec())
            .unwrap();
        let resolver = ResourceResolver::new(provider);

        let doc = resolver
            .resolve("base.xslt", Some("pages/home.xslt"))
            .unwrap()
            .unwrap();
        assert_eq!(doc.uri, "pages/base.xslt");
        assert_eq!(doc.text, "<xsl:stylesheet/>");
    }

    #[test]
    fn test_resource_resolver_declines_foreign_schemes() {
        let resolver = ResourceResolver::new(Arc::new(InMemoryResourceProvider::new()));
        assert!(resolver.resolve("http://example.com/a.xsl", None).unwrap().is_none());
    }

    #[test]
    fn test_resource_resolver_missing_document_is_an_error() {
        let resolver = ResourceResolver::new(Arc::new(InMemoryResourceProvider::new()));
        let err = resolver.resolve("missing.xslt", None).unwrap_err();
        assert!(matches!(err, XsltError::Resource(_)));
    }
}
