//! Defines the registry and built-in implementations for XPath 1.0 functions, plus the
//! XSLT additions `key()`, `current()` and `generate-id()`.

use super::engine::{EvaluationContext, XPathValue, string_to_number};
use crate::datasource::{Node, NodeType, XML_NAMESPACE};
use crate::error::XPathError;
use std::collections::HashSet;

/// Functions outside the core library, reached through a namespace prefix
/// (`prefix:name(...)`). Implementations answer `None` for names they do not provide.
pub trait ExtensionFunctions {
    fn call(
        &self,
        namespace_uri: &str,
        local_name: &str,
        args: Vec<XPathValue>,
    ) -> Option<Result<XPathValue, XPathError>>;
}

/// The set of unprefixed function names an expression may call.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashSet<&'static str>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashSet::new(),
        }
    }
    pub fn register(&mut self, name: &'static str) {
        self.functions.insert(name);
    }
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains(name)
    }
}

const BUILT_INS: &[&str] = &[
    // Core & Node-Set
    "string", "count", "id", "position", "last", "local-name", "name", "namespace-uri", "key",
    "generate-id", "current",
    // String
    "concat", "starts-with", "contains", "substring-before", "substring-after", "substring",
    "string-length", "normalize-space", "translate",
    // Boolean
    "boolean", "not", "true", "false", "lang",
    // Number
    "number", "sum", "floor", "ceiling", "round",
];

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        for name in BUILT_INS {
            registry.register(name);
        }
        registry
    }
}

/// Dispatches a function call to the correct implementation.
pub fn evaluate_function(
    name: &str,
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    match name {
        // Core & Node-Set
        "string" => func_string(args, e_ctx),
        "count" => func_count(args),
        "id" => func_id(args, e_ctx),
        "position" => {
            check_arity("position()", &args, 0, 0)?;
            Ok(XPathValue::Number(e_ctx.context_position as f64))
        }
        "last" => {
            check_arity("last()", &args, 0, 0)?;
            Ok(XPathValue::Number(e_ctx.context_size as f64))
        }
        "local-name" => func_local_name(args, e_ctx),
        "name" => func_name(args, e_ctx),
        "namespace-uri" => func_namespace_uri(args, e_ctx),
        "key" => func_key(args, e_ctx),
        "generate-id" => func_generate_id(args, e_ctx),
        "current" => {
            check_arity("current()", &args, 0, 0)?;
            Ok(XPathValue::NodeSet(vec![e_ctx.current_node.clone()]))
        }

        // String
        "concat" => func_concat(args),
        "starts-with" => string_pair("starts-with()", args, |a, b| {
            XPathValue::Boolean(a.starts_with(b))
        }),
        "contains" => string_pair("contains()", args, |a, b| XPathValue::Boolean(a.contains(b))),
        "substring-before" => string_pair("substring-before()", args, |a, b| {
            XPathValue::String(a.find(b).map(|i| a[..i].to_string()).unwrap_or_default())
        }),
        "substring-after" => string_pair("substring-after()", args, |a, b| {
            XPathValue::String(
                a.find(b)
                    .map(|i| a[i + b.len()..].to_string())
                    .unwrap_or_default(),
            )
        }),
        "substring" => func_substring(args),
        "string-length" => func_string_length(args, e_ctx),
        "normalize-space" => func_normalize_space(args, e_ctx),
        "translate" => func_translate(args),

        // Boolean
        "boolean" => {
            let arg = single_arg("boolean()", args)?;
            Ok(XPathValue::Boolean(arg.to_bool()))
        }
        "not" => {
            let arg = single_arg("not()", args)?;
            Ok(XPathValue::Boolean(!arg.to_bool()))
        }
        "true" => {
            check_arity("true()", &args, 0, 0)?;
            Ok(XPathValue::Boolean(true))
        }
        "false" => {
            check_arity("false()", &args, 0, 0)?;
            Ok(XPathValue::Boolean(false))
        }
        "lang" => func_lang(args, e_ctx),

        // Number
        "number" => func_number(args, e_ctx),
        "sum" => func_sum(args),
        "floor" => Ok(XPathValue::Number(single_arg("floor()", args)?.to_number().floor())),
        "ceiling" => Ok(XPathValue::Number(single_arg("ceiling()", args)?.to_number().ceil())),
        "round" => func_round(args),

        _ => Err(XPathError::function(name, "Unknown XPath function")),
    }
}

fn check_arity(
    function: &str,
    args: &[XPathValue],
    min: usize,
    max: usize,
) -> Result<(), XPathError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = match (min, max) {
        (min, max) if min == max => format!("Expected {} argument(s)", min),
        (min, usize::MAX) => format!("Expected at least {} arguments", min),
        (min, max) => format!("Expected {} to {} arguments", min, max),
    };
    Err(XPathError::function(function, expected))
}

fn single_arg(function: &str, args: Vec<XPathValue>) -> Result<XPathValue, XPathError> {
    check_arity(function, &args, 1, 1)?;
    args.into_iter()
        .next()
        .ok_or_else(|| XPathError::function(function, "Expected 1 argument"))
}

/// The argument string, or the context node's string value when no argument is given.
fn string_or_context(
    function: &str,
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<String, XPathError> {
    check_arity(function, &args, 0, 1)?;
    Ok(match args.into_iter().next() {
        Some(arg) => arg.to_string(),
        None => e_ctx.context_node.string_value(),
    })
}

/// The first node of the argument in document order, or the context node without argument.
fn node_or_context(
    function: &str,
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<Option<Node>, XPathError> {
    check_arity(function, &args, 0, 1)?;
    match args.into_iter().next() {
        None => Ok(Some(e_ctx.context_node.clone())),
        Some(XPathValue::NodeSet(nodes)) => Ok(nodes.into_iter().min()),
        Some(v) => Err(XPathError::TypeError(format!(
            "{} argument must be a node-set, got {}",
            function,
            v.type_name()
        ))),
    }
}

fn string_pair(
    function: &str,
    args: Vec<XPathValue>,
    f: impl Fn(&str, &str) -> XPathValue,
) -> Result<XPathValue, XPathError> {
    check_arity(function, &args, 2, 2)?;
    let s1 = args[0].to_string();
    let s2 = args[1].to_string();
    Ok(f(&s1, &s2))
}

// --- Core & Node-Set Functions ---

fn func_string(
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    Ok(XPathValue::String(string_or_context("string()", args, e_ctx)?))
}

fn func_count(args: Vec<XPathValue>) -> Result<XPathValue, XPathError> {
    match single_arg("count()", args)? {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(nodes.len() as f64)),
        v => Err(XPathError::TypeError(format!(
            "count() argument must be a node-set, got {}",
            v.type_name()
        ))),
    }
}

fn func_id(args: Vec<XPathValue>, e_ctx: &EvaluationContext<'_>) -> Result<XPathValue, XPathError> {
    let id_string = match single_arg("id()", args)? {
        XPathValue::NodeSet(nodes) => nodes
            .iter()
            .map(Node::string_value)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    };
    let ids_to_find: HashSet<&str> = id_string.split_whitespace().collect();
    if ids_to_find.is_empty() {
        return Ok(XPathValue::NodeSet(vec![]));
    }

    let mut results = Vec::new();
    let mut stack = vec![e_ctx.context_node.root()];
    while let Some(node) = stack.pop() {
        if node.is_element()
            && node.attributes().iter().any(|attr| {
                attr.name().is_some_and(|q| {
                    q.local_part == "id"
                        && (q.namespace.is_none() || q.namespace.as_deref() == Some(XML_NAMESPACE))
                }) && ids_to_find.contains(attr.string_value().as_str())
            })
        {
            results.push(node.clone());
        }
        stack.extend(node.children());
    }

    results.sort();
    Ok(XPathValue::NodeSet(results))
}

fn func_key(args: Vec<XPathValue>, e_ctx: &EvaluationContext<'_>) -> Result<XPathValue, XPathError> {
    check_arity("key()", &args, 2, 2)?;
    let mut args = args.into_iter();
    let key_name = args.next().map(|v| v.to_string()).unwrap_or_default();
    let key_value_arg = args.next().unwrap_or(XPathValue::NodeSet(vec![]));

    let Some(key_index) = e_ctx.key_indexes.and_then(|keys| keys.get(&key_name)) else {
        return Ok(XPathValue::NodeSet(vec![]));
    };

    let key_values = match key_value_arg {
        XPathValue::NodeSet(nodes) => nodes.iter().map(Node::string_value).collect::<Vec<_>>(),
        other => vec![other.to_string()],
    };

    let mut result_nodes: Vec<Node> = key_values
        .iter()
        .filter_map(|value| key_index.get(value))
        .flatten()
        .cloned()
        .collect();
    result_nodes.sort();
    result_nodes.dedup();
    Ok(XPathValue::NodeSet(result_nodes))
}

fn func_local_name(
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    let node = node_or_context("local-name()", args, e_ctx)?;
    let name = node
        .and_then(|n| n.name().map(|q| q.local_part.clone()))
        .unwrap_or_default();
    Ok(XPathValue::String(name))
}

fn func_name(args: Vec<XPathValue>, e_ctx: &EvaluationContext<'_>) -> Result<XPathValue, XPathError> {
    let node = node_or_context("name()", args, e_ctx)?;
    let name = node.and_then(|n| n.name().map(|q| q.qualified())).unwrap_or_default();
    Ok(XPathValue::String(name))
}

fn func_namespace_uri(
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    let node = node_or_context("namespace-uri()", args, e_ctx)?;
    let uri = node
        .and_then(|n| n.name().and_then(|q| q.namespace.clone()))
        .unwrap_or_default();
    Ok(XPathValue::String(uri))
}

fn func_generate_id(
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    // Node handles carry a process-wide unique id, prefixed so the result is an NCName.
    let node = node_or_context("generate-id()", args, e_ctx)?;
    Ok(XPathValue::String(
        node.map(|n| format!("id{}", n.unique_id())).unwrap_or_default(),
    ))
}

// --- String Functions ---

fn func_concat(args: Vec<XPathValue>) -> Result<XPathValue, XPathError> {
    check_arity("concat()", &args, 2, usize::MAX)?;
    let result = args.iter().map(|v| v.to_string()).collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_substring(args: Vec<XPathValue>) -> Result<XPathValue, XPathError> {
    check_arity("substring()", &args, 2, 3)?;
    let s = args[0].to_string();
    let start_val = args[1].to_number();
    let length_val = args.get(2).map(XPathValue::to_number);

    // XPath rounding rules for start/length
    let first = round_half_up(start_val);
    let last = match length_val {
        Some(l) => first + round_half_up(l),
        None => f64::INFINITY,
    };

    let result = s
        .chars()
        .enumerate()
        .filter_map(|(i, c)| {
            let pos = (i + 1) as f64; // XPath positions are 1-based
            (pos >= first && pos < last).then_some(c)
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_string_length(
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    let s = string_or_context("string-length()", args, e_ctx)?;
    Ok(XPathValue::Number(s.chars().count() as f64))
}

fn func_normalize_space(
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    let s = string_or_context("normalize-space()", args, e_ctx)?;
    let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(XPathValue::String(normalized))
}

fn func_translate(args: Vec<XPathValue>) -> Result<XPathValue, XPathError> {
    check_arity("translate()", &args, 3, 3)?;
    let source_str = args[0].to_string();
    let from_str: Vec<char> = args[1].to_string().chars().collect();
    let to_str: Vec<char> = args[2].to_string().chars().collect();
    let result = source_str
        .chars()
        .filter_map(|c| match from_str.iter().position(|&fc| fc == c) {
            Some(pos) => to_str.get(pos).copied(),
            None => Some(c),
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

// --- Boolean Functions ---

fn func_lang(args: Vec<XPathValue>, e_ctx: &EvaluationContext<'_>) -> Result<XPathValue, XPathError> {
    let test_lang = single_arg("lang()", args)?.to_string().to_lowercase();
    let mut current = Some(e_ctx.context_node.clone());

    // If context node is not an element, start with its parent.
    if current.as_ref().is_some_and(|n| n.node_type() != NodeType::Element) {
        current = current.and_then(|n| n.parent());
    }

    while let Some(node) = current {
        let declared = node.attributes().into_iter().find(|attr| {
            attr.name().is_some_and(|q| {
                q.local_part == "lang" && q.namespace.as_deref() == Some(XML_NAMESPACE)
            })
        });
        if let Some(attr) = declared {
            // The nearest xml:lang decides; "en" matches "en-GB".
            let node_lang = attr.string_value().to_lowercase();
            let matches =
                node_lang == test_lang || node_lang.starts_with(&format!("{}-", test_lang));
            return Ok(XPathValue::Boolean(matches));
        }
        current = node.parent();
    }
    Ok(XPathValue::Boolean(false))
}

// --- Number Functions ---

fn func_number(
    args: Vec<XPathValue>,
    e_ctx: &EvaluationContext<'_>,
) -> Result<XPathValue, XPathError> {
    check_arity("number()", &args, 0, 1)?;
    let n = match args.into_iter().next() {
        Some(arg) => arg.to_number(),
        None => string_to_number(&e_ctx.context_node.string_value()),
    };
    Ok(XPathValue::Number(n))
}

fn func_sum(args: Vec<XPathValue>) -> Result<XPathValue, XPathError> {
    match single_arg("sum()", args)? {
        XPathValue::NodeSet(nodes) => Ok(XPathValue::Number(
            nodes
                .iter()
                .map(|node| string_to_number(&node.string_value()))
                .sum(),
        )),
        v => Err(XPathError::TypeError(format!(
            "sum() argument must be a node-set, got {}",
            v.type_name()
        ))),
    }
}

/// XPath rounding: halves go towards positive infinity.
fn round_half_up(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        return n;
    }
    (n + 0.5).floor()
}

fn func_round(args: Vec<XPathValue>) -> Result<XPathValue, XPathError> {
    let n = single_arg("round()", args)?.to_number();
    Ok(XPathValue::Number(round_half_up(n)))
}
