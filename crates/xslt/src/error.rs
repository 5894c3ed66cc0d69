use thiserror::Error;
use xdjango_traits::ResourceError;
use xdjango_xpath1::XPathError;

#[derive(Debug, Clone)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

impl From<(usize, usize)> for Location {
    fn from((line, col): (usize, usize)) -> Self {
        Location { line, col }
    }
}

#[derive(Error, Debug)]
pub enum XsltError {
    #[error("Quick-XML error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    #[error("XPath evaluation error: {0}")]
    XPath(#[from] XPathError),

    #[error("Template compilation error: {0}")]
    Compilation(String),

    #[error("Template execution error: {0}")]
    Execution(String),

    #[error("XPath parse error in '{0}': {1}")]
    XPathParse(String, String),

    #[error("Template structure error at {location}: {message}")]
    TemplateStructure { message: String, location: Location },

    #[error("Template syntax error: {msg} at {location}")]
    TemplateSyntax { msg: String, location: Location },

    #[error("Unknown extension function '{name}' in namespace '{namespace}'")]
    UnknownExtensionFunction { namespace: String, name: String },

    #[error("Failed to import '{href}': {message}")]
    Import { href: String, message: String },

    #[error("Circular import detected: {0}")]
    CircularImport(String),

    #[error("No document resolver could load '{0}'")]
    Unresolved(String),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("UTF-8 string error: {0}")]
    Utf8Str(#[from] std::str::Utf8Error),
}

impl XsltError {
    pub fn import(href: impl Into<String>, message: impl Into<String>) -> Self {
        XsltError::Import {
            href: href.into(),
            message: message.into(),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for XsltError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        XsltError::QuickXml(quick_xml::Error::InvalidAttr(e))
    }
}

impl From<crate::executor::ExecutionError> for XsltError {
    fn from(e: crate::executor::ExecutionError) -> Self {
        XsltError::Execution(e.to_string())
    }
}
