//! XPath 1.0 for the xdjango workspace.
//!
//! Expressions are parsed into an [`Expression`] tree by [`parse_expression`] and evaluated
//! against the owned node tree in [`datasource`]. Functions outside the core library are
//! resolved through the [`ExtensionFunctions`] trait, keyed by namespace URI.

pub mod ast;
pub mod axes;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod functions;
pub mod operators;
pub mod parser;

pub use ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, Step};
pub use datasource::builder::DocumentBuilder;
pub use datasource::serialize::{OutputMethod, SerializeOptions, serialize_document, serialize_node};
pub use datasource::xml::parse_document;
pub use datasource::{Node, NodeType, QName, XML_NAMESPACE};
pub use engine::{
    EvaluationContext, KeyIndexes, NamespaceMap, XPathValue, evaluate, number_to_string,
    string_to_number,
};
pub use error::XPathError;
pub use functions::{ExtensionFunctions, FunctionRegistry};
pub use parser::parse_expression;
