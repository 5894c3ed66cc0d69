//! The evaluation engine for executing a parsed XPath AST against the shared node tree.

use super::ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step, UnaryOperator};
use super::functions::{self, ExtensionFunctions, FunctionRegistry};
use super::{axes, operators};
use crate::datasource::{Node, NodeType};
use crate::error::XPathError;
use std::collections::HashMap;
use std::fmt;

/// Prefix to namespace URI bindings in scope for an expression.
pub type NamespaceMap = HashMap<String, String>;

/// Pre-computed `xsl:key` indexes: key name -> key value -> matching nodes.
pub type KeyIndexes = HashMap<String, HashMap<String, Vec<Node>>>;

/// Represents the possible result types of an XPath expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    NodeSet(Vec<Node>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl XPathValue {
    /// Coerces the XPath value to a boolean as per XPath 1.0 rules.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// Coerces the XPath value to a number as per XPath 1.0 rules.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => string_to_number(s),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|n| string_to_number(&n.string_value()))
                .unwrap_or(f64::NAN),
        }
    }

    pub fn as_node_set(&self) -> Option<&[Node]> {
        match self {
            XPathValue::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn into_node_set(self) -> Result<Vec<Node>, XPathError> {
        match self {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::TypeError(format!(
                "expected a node-set, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            XPathValue::NodeSet(_) => "node-set",
            XPathValue::String(_) => "string",
            XPathValue::Number(_) => "number",
            XPathValue::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for XPathValue {
    /// Coerces the XPath value to a string as per XPath 1.0 rules.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::NodeSet(nodes) => write!(
                f,
                "{}",
                nodes.first().map(|n| n.string_value()).unwrap_or_default()
            ),
            XPathValue::String(s) => write!(f, "{}", s),
            XPathValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            XPathValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for XPathValue {
    fn from(value: &str) -> Self {
        XPathValue::String(value.to_string())
    }
}

impl From<String> for XPathValue {
    fn from(value: String) -> Self {
        XPathValue::String(value)
    }
}

impl From<f64> for XPathValue {
    fn from(value: f64) -> Self {
        XPathValue::Number(value)
    }
}

impl From<bool> for XPathValue {
    fn from(value: bool) -> Self {
        XPathValue::Boolean(value)
    }
}

impl From<Node> for XPathValue {
    fn from(value: Node) -> Self {
        XPathValue::NodeSet(vec![value])
    }
}

/// Formats a number the way `string()` does: integers without a fraction, `NaN`,
/// `Infinity` and `-Infinity` spelled out, negative zero as `0`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// Parses a string the way `number()` does. Only an optional minus sign, digits and a
/// single decimal point are accepted, surrounded by optional whitespace.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits != "."
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// A container for all state needed during expression evaluation.
/// `'d` is the lifetime of the borrowed evaluation environment.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'d> {
    pub context_node: &'d Node,
    pub root_node: &'d Node,
    /// The node `current()` returns; the context node of the enclosing XSLT instruction.
    pub current_node: &'d Node,
    pub functions: &'d FunctionRegistry,
    pub context_position: usize, // 1-based index
    pub context_size: usize,
    pub variables: &'d HashMap<String, XPathValue>,
    /// Read-only access to the pre-computed key indexes.
    pub key_indexes: Option<&'d KeyIndexes>,
    pub namespaces: Option<&'d NamespaceMap>,
    pub extensions: Option<&'d dyn ExtensionFunctions>,
    /// If true, enables strict error checking.
    pub strict: bool,
}

impl<'d> EvaluationContext<'d> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context_node: &'d Node,
        root_node: &'d Node,
        functions: &'d FunctionRegistry,
        context_position: usize,
        context_size: usize,
        variables: &'d HashMap<String, XPathValue>,
        key_indexes: Option<&'d KeyIndexes>,
        strict: bool,
    ) -> Self {
        Self {
            context_node,
            root_node,
            current_node: context_node,
            functions,
            context_position,
            context_size,
            variables,
            key_indexes,
            namespaces: None,
            extensions: None,
            strict,
        }
    }

    pub fn with_namespaces(mut self, namespaces: &'d NamespaceMap) -> Self {
        self.namespaces = Some(namespaces);
        self
    }

    pub fn with_extensions(mut self, extensions: &'d dyn ExtensionFunctions) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_current_node(mut self, current_node: &'d Node) -> Self {
        self.current_node = current_node;
        self
    }

    /// A context for evaluating a predicate against one member of a node list.
    fn for_predicate<'n>(&self, node: &'n Node, position: usize, size: usize) -> EvaluationContext<'n>
    where
        'd: 'n,
    {
        EvaluationContext {
            context_node: node,
            root_node: self.root_node,
            current_node: self.current_node,
            functions: self.functions,
            context_position: position,
            context_size: size,
            variables: self.variables,
            key_indexes: self.key_indexes,
            namespaces: self.namespaces,
            extensions: self.extensions,
            strict: self.strict,
        }
    }

    /// Resolves a namespace prefix used in a name test or function name.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<String, XPathError> {
        if prefix == "xml" {
            return Ok(crate::datasource::XML_NAMESPACE.to_string());
        }
        self.namespaces
            .and_then(|ns| ns.get(prefix))
            .cloned()
            .ok_or_else(|| XPathError::UnknownPrefix(prefix.to_string()))
    }
}

/// Evaluates a compiled expression and returns a concrete `XPathValue`.
pub fn evaluate(expr: &Expression, e_ctx: &EvaluationContext<'_>) -> Result<XPathValue, XPathError> {
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            let nodes = evaluate_location_path(path, e_ctx)?;
            Ok(XPathValue::NodeSet(nodes))
        }
        Expression::Variable(name) => match e_ctx.variables.get(name) {
            Some(value) => Ok(value.clone()),
            None if e_ctx.strict => Err(XPathError::UnknownVariable(name.clone())),
            None => Ok(XPathValue::String(String::new())),
        },
        Expression::FunctionCall { name, args } => {
            let mut evaluated_args = Vec::with_capacity(args.len());
            for arg in args {
                evaluated_args.push(evaluate(arg, e_ctx)?);
            }
            call_function(name, evaluated_args, e_ctx)
        }
        Expression::Filter {
            primary,
            predicates,
        } => {
            let mut nodes = evaluate(primary, e_ctx)?.into_node_set()?;
            nodes.sort();
            nodes.dedup();
            let nodes = apply_predicates(nodes, predicates, e_ctx)?;
            Ok(XPathValue::NodeSet(nodes))
        }
        Expression::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => Ok(XPathValue::Boolean(
            evaluate(left, e_ctx)?.to_bool() && evaluate(right, e_ctx)?.to_bool(),
        )),
        Expression::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => Ok(XPathValue::Boolean(
            evaluate(left, e_ctx)?.to_bool() || evaluate(right, e_ctx)?.to_bool(),
        )),
        Expression::BinaryOp { left, op, right } => {
            let left_val = evaluate(left, e_ctx)?;
            let right_val = evaluate(right, e_ctx)?;
            operators::evaluate(*op, left_val, right_val)
        }
        Expression::UnaryOp { op, expr } => {
            let val = evaluate(expr, e_ctx)?;
            match op {
                UnaryOperator::Minus => Ok(XPathValue::Number(-val.to_number())),
            }
        }
    }
}

/// Dispatches a call either to the core library or, for prefixed names, to the extension
/// functions registered for the prefix's namespace.
fn call_function(
    name: &str,
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    let Some((prefix, local_name)) = name.split_once(':') else {
        if !e_ctx.functions.contains(name) {
            return Err(XPathError::function(name, "Unknown XPath function"));
        }
        return functions::evaluate_function(name, args, e_ctx);
    };

    let namespace_uri = e_ctx.resolve_prefix(prefix)?;
    log::trace!("Calling extension function {{{}}}{}", namespace_uri, local_name);
    let Some(extensions) = e_ctx.extensions else {
        return Err(XPathError::function(name, "No extension functions are available"));
    };
    match extensions.call(&namespace_uri, local_name, args) {
        Some(result) => result,
        None => Err(XPathError::function(
            name,
            format!("No function '{}' in namespace '{}'", local_name, namespace_uri),
        )),
    }
}

fn evaluate_location_path(
    path: &LocationPath,
    e_ctx: &EvaluationContext<'_>,
) -> Result<Vec<Node>, XPathError> {
    let initial_context = if let Some(start_expr) = &path.start_point {
        // The path starts from the result of another expression.
        let mut nodes = evaluate(start_expr, e_ctx)?.into_node_set()?;
        nodes.sort();
        nodes.dedup();
        nodes
    } else if path.is_absolute {
        vec![e_ctx.context_node.root()]
    } else {
        vec![e_ctx.context_node.clone()]
    };

    let mut current_nodes = initial_context;
    for step in &path.steps {
        current_nodes = evaluate_step(step, &current_nodes, e_ctx)?;
    }
    Ok(current_nodes)
}

/// Evaluates a single step: for every context node, collect the axis, test the nodes and
/// apply the predicates with proximity positions. The union is returned in document order.
fn evaluate_step(
    step: &Step,
    context_nodes: &[Node],
    e_ctx: &EvaluationContext<'_>,
) -> Result<Vec<Node>, XPathError> {
    let mut results = Vec::new();
    for node in context_nodes {
        let axis_nodes = collect_axis_nodes(step.axis, node);
        let tested = filter_by_node_test(axis_nodes, &step.node_test, step.axis, e_ctx)?;
        results.extend(apply_predicates(tested, &step.predicates, e_ctx)?);
    }
    if context_nodes.len() > 1 || step.axis.is_reverse() {
        results.sort();
        results.dedup();
    }
    Ok(results)
}

/// Stage 1: collects the nodes along `axis` from one context node, in axis order.
fn collect_axis_nodes(axis: Axis, node: &Node) -> Vec<Node> {
    match axis {
        Axis::Child => axes::collect_child_nodes(node),
        Axis::Attribute => axes::collect_attribute_nodes(node),
        Axis::Descendant => axes::collect_descendant_nodes(node),
        Axis::DescendantOrSelf => axes::collect_descendant_or_self_nodes(node),
        Axis::Parent => axes::collect_parent_nodes(node),
        Axis::Ancestor => axes::collect_ancestor_nodes(node),
        Axis::AncestorOrSelf => axes::collect_ancestor_or_self_nodes(node),
        Axis::SelfAxis => vec![node.clone()],
        Axis::FollowingSibling => axes::collect_following_sibling_nodes(node),
        Axis::PrecedingSibling => axes::collect_preceding_sibling_nodes(node),
        Axis::Following => axes::collect_following_nodes(node),
        Axis::Preceding => axes::collect_preceding_nodes(node),
    }
}

/// Stage 2: filters a set of nodes based on a `NodeTest`.
fn filter_by_node_test(
    nodes: Vec<Node>,
    test: &NodeTest,
    axis: Axis,
    e_ctx: &EvaluationContext<'_>,
) -> Result<Vec<Node>, XPathError> {
    let principal = if axis == Axis::Attribute {
        NodeType::Attribute
    } else {
        NodeType::Element
    };

    let result = match test {
        NodeTest::Wildcard => nodes
            .into_iter()
            .filter(|node| node.node_type() == principal)
            .collect(),
        NodeTest::PrefixWildcard(prefix) => {
            let uri = e_ctx.resolve_prefix(prefix)?;
            nodes
                .into_iter()
                .filter(|node| {
                    node.node_type() == principal
                        && node.name().and_then(|q| q.namespace.as_deref()) == Some(uri.as_str())
                })
                .collect()
        }
        NodeTest::Name(name) => {
            let (namespace, local) = match name.split_once(':') {
                Some((prefix, local)) => (Some(e_ctx.resolve_prefix(prefix)?), local),
                None => (None, name.as_str()),
            };
            nodes
                .into_iter()
                .filter(|node| {
                    node.node_type() == principal
                        && node.name().is_some_and(|q| {
                            q.local_part == local && q.namespace.as_deref() == namespace.as_deref()
                        })
                })
                .collect()
        }
        NodeTest::NodeType(ntt) => nodes
            .into_iter()
            .filter(|node| match ntt {
                NodeTypeTest::Text => node.node_type() == NodeType::Text,
                NodeTypeTest::Comment => node.node_type() == NodeType::Comment,
                NodeTypeTest::ProcessingInstruction => {
                    node.node_type() == NodeType::ProcessingInstruction
                }
                NodeTypeTest::Node => true,
            })
            .collect(),
    };
    Ok(result)
}

/// Stage 3: filters a node list by a series of predicates. Positions follow the order of
/// `nodes`, which callers supply in axis order.
fn apply_predicates(
    nodes: Vec<Node>,
    predicates: &[Expression],
    e_ctx: &EvaluationContext<'_>,
) -> Result<Vec<Node>, XPathError> {
    let mut final_nodes = nodes;
    for predicate in predicates {
        let context_size = final_nodes.len();
        let mut predicate_results = Vec::with_capacity(context_size);
        for (i, node) in final_nodes.iter().enumerate() {
            let predicate_e_ctx = e_ctx.for_predicate(node, i + 1, context_size);
            let result = evaluate(predicate, &predicate_e_ctx)?;
            let keep = match result {
                XPathValue::Number(n) => n == (i + 1) as f64,
                _ => result.to_bool(),
            };
            if keep {
                predicate_results.push(node.clone());
            }
        }
        final_nodes = predicate_results;
    }
    Ok(final_nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::xml::parse_document;
    use crate::parser::parse_expression;

    const LIBRARY: &str = r#"<library xmlns:d="urn:data">
        <book id="b1" year="1999"><title>Dune</title></book>
        <book id="b2" year="2004"><title>Emma</title><d:note>signed</d:note></book>
        <book id="b3" year="2010"><title>Ulysses</title></book>
    </library>"#;

    fn eval_with(
        xml: &str,
        expr: &str,
        vars: &HashMap<String, XPathValue>,
    ) -> Result<XPathValue, XPathError> {
        let root = parse_document(xml)?;
        let funcs = FunctionRegistry::default();
        let mut namespaces = NamespaceMap::new();
        namespaces.insert("d".to_string(), "urn:data".to_string());
        let e_ctx = EvaluationContext::new(&root, &root, &funcs, 1, 1, vars, None, false)
            .with_namespaces(&namespaces);
        evaluate(&parse_expression(expr)?, &e_ctx)
    }

    fn eval(expr: &str) -> XPathValue {
        eval_with(LIBRARY, expr, &HashMap::new()).unwrap()
    }

    fn strings(value: &XPathValue) -> Vec<String> {
        value
            .as_node_set()
            .unwrap()
            .iter()
            .map(Node::string_value)
            .collect()
    }

    #[test]
    fn test_predicate_by_attribute() {
        let result = eval("/library/book[@id='b2']/title");
        assert_eq!(strings(&result), vec!["Emma"]);
    }

    #[test]
    fn test_predicate_by_position_is_per_context_node() {
        // Each book contributes its own first title.
        let result = eval("//book/title[1]");
        assert_eq!(strings(&result), vec!["Dune", "Emma", "Ulysses"]);
        let result = eval("(//title)[2]");
        assert_eq!(strings(&result), vec!["Emma"]);
    }

    #[test]
    fn test_reverse_axis_positions() {
        let result = eval("//book[3]/preceding-sibling::book[1]/@id");
        assert_eq!(strings(&result), vec!["b2"]);
        let result = eval("//title[. = 'Emma']/ancestor::*[last()]");
        assert_eq!(result.as_node_set().unwrap()[0].name().unwrap().local_part, "library");
    }

    #[test]
    fn test_namespaced_name_tests() {
        assert_eq!(strings(&eval("//d:note")), vec!["signed"]);
        assert_eq!(strings(&eval("//d:*")), vec!["signed"]);
        // An unprefixed name never matches a namespaced element.
        assert_eq!(eval("count(//note)").to_number(), 0.0);
    }

    #[test]
    fn test_unknown_prefix_is_an_error() {
        let err = eval_with(LIBRARY, "//x:note", &HashMap::new()).unwrap_err();
        assert!(matches!(err, XPathError::UnknownPrefix(p) if p == "x"));
    }

    #[test]
    fn test_union_is_in_document_order() {
        let result = eval("//book[3]/title | //book[1]/title");
        assert_eq!(strings(&result), vec!["Dune", "Ulysses"]);
    }

    #[test]
    fn test_variable_evaluation() {
        let mut vars = HashMap::new();
        vars.insert("myVar".to_string(), XPathValue::from("test-value"));
        let result = eval_with(LIBRARY, "$myVar", &vars).unwrap();
        assert_eq!(result.to_string(), "test-value");
    }

    #[test]
    fn test_path_and_filter_from_variable_node_set() {
        let root = parse_document(LIBRARY).unwrap();
        let books = eval("//book");
        let mut vars = HashMap::new();
        vars.insert("books".to_string(), books);
        let funcs = FunctionRegistry::default();
        let e_ctx = EvaluationContext::new(&root, &root, &funcs, 1, 1, &vars, None, false);

        let expr = parse_expression("$books[2]/title").unwrap();
        assert_eq!(strings(&evaluate(&expr, &e_ctx).unwrap()), vec!["Emma"]);
        let expr = parse_expression("$books[@year > 2000]/@id").unwrap();
        assert_eq!(strings(&evaluate(&expr, &e_ctx).unwrap()), vec!["b2", "b3"]);
    }

    #[test]
    fn test_parent_step() {
        let result = eval("//title[. = 'Dune']/../@year");
        assert_eq!(strings(&result), vec!["1999"]);
    }

    #[test]
    fn test_strict_mode_rejects_unknown_variables() {
        let root = parse_document("<a/>").unwrap();
        let funcs = FunctionRegistry::default();
        let vars = HashMap::new();
        let e_ctx = EvaluationContext::new(&root, &root, &funcs, 1, 1, &vars, None, true);
        let err = evaluate(&parse_expression("$missing").unwrap(), &e_ctx).unwrap_err();
        assert!(matches!(err, XPathError::UnknownVariable(_)));
    }

    #[test]
    fn test_extension_function_dispatch() {
        struct Shout;
        impl ExtensionFunctions for Shout {
            fn call(
                &self,
                namespace_uri: &str,
                local_name: &str,
                args: Vec<XPathValue>,
            ) -> Option<Result<XPathValue, XPathError>> {
                (namespace_uri == "urn:shout" && local_name == "loud.er").then(|| {
                    Ok(XPathValue::String(
                        args.first().map(|a| a.to_string()).unwrap_or_default().to_uppercase(),
                    ))
                })
            }
        }

        let _ = env_logger::builder().is_test(true).try_init();
        let root = parse_document("<a>quiet</a>").unwrap();
        let funcs = FunctionRegistry::default();
        let vars = HashMap::new();
        let mut namespaces = NamespaceMap::new();
        namespaces.insert("s".to_string(), "urn:shout".to_string());
        let shout = Shout;
        let e_ctx = EvaluationContext::new(&root, &root, &funcs, 1, 1, &vars, None, false)
            .with_namespaces(&namespaces)
            .with_extensions(&shout);

        let expr = parse_expression("s:loud.er(string(/a))").unwrap();
        assert_eq!(evaluate(&expr, &e_ctx).unwrap().to_string(), "QUIET");

        let expr = parse_expression("s:other()").unwrap();
        assert!(matches!(
            evaluate(&expr, &e_ctx).unwrap_err(),
            XPathError::FunctionError { .. }
        ));
    }

    #[test]
    fn test_number_formatting_and_parsing() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(string_to_number(" 12.5 "), 12.5);
        assert_eq!(string_to_number("-4"), -4.0);
        assert!(string_to_number("1e3").is_nan());
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("").is_nan());
    }
}
