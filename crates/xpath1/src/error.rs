use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum XPathError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("XPath parse error in '{0}': {1}")]
    XPathParse(String, String),

    #[error("Function '{function}' error: {message}")]
    FunctionError { function: String, message: String },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Variable '{0}' not found")]
    UnknownVariable(String),

    #[error("Namespace prefix '{0}' is not declared")]
    UnknownPrefix(String),

    #[error("XML syntax error: {0}")]
    XmlSyntax(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl XPathError {
    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        XPathError::FunctionError {
            function: function.into(),
            message: message.into(),
        }
    }
}
