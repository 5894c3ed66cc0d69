//! A dedicated engine for parsing and evaluating XSLT `match` patterns.
use crate::error::XsltError;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::multispace0;
use nom::combinator::{map, opt};
use nom::multi::many0;
use nom::sequence::{delimited, preceded};
use nom::{IResult, Parser};
use std::fmt;
use std::sync::Arc;
use xdjango_xpath1::ast::{NodeTest, NodeTypeTest};
use xdjango_xpath1::parser as xpath_parser;
use xdjango_xpath1::{
    EvaluationContext, Expression, NamespaceMap, Node, NodeType, XPathError, XPathValue,
};

/// The axes relevant for match patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchAxis {
    Child,
    Attribute,
}

/// How a step relates to the step on its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    /// `/`: the left step matches the parent.
    Parent,
    /// `//`: the left step matches some ancestor.
    Ancestor,
}

/// A node test with its prefix already resolved to a namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StepTest {
    Name {
        namespace: Option<String>,
        local: String,
    },
    NamespaceWildcard(String),
    Wildcard,
    NodeType(NodeTypeTest),
}

/// Represents a single location step in a match pattern (e.g., `foo`, `*`, `text()`).
#[derive(Debug, Clone, PartialEq)]
struct MatchStep {
    axis: MatchAxis,
    test: StepTest,
    predicates: Vec<Expression>,
    separator: Separator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Relative,
    /// `/...`: the first step matches a child of the root node.
    Root,
    /// `//...`: the first step matches anywhere below the root node.
    RootDescendant,
}

/// A single location path within a pattern, e.g., "/doc/section/para".
#[derive(Debug, Clone, PartialEq)]
struct LocationPathPattern {
    anchor: Anchor,
    steps: Vec<MatchStep>,
}

/// A compiled representation of an XSLT match pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// A pattern can be a union of multiple paths, e.g., "para|note".
    paths: Vec<LocationPathPattern>,
    namespaces: Arc<NamespaceMap>,
    original_text: String,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original_text)
    }
}

impl Pattern {
    /// Evaluates if a given node matches this compiled pattern. `base` supplies the
    /// functions, variables and extensions that predicates are evaluated with.
    pub fn matches(&self, node: &Node, base: &EvaluationContext<'_>) -> Result<bool, XPathError> {
        for path in &self.paths {
            if path.matches(node, &self.namespaces, base)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The default priority of a single-path pattern, as assigned when a template rule has
    /// no `priority` attribute. Unions should be split with [`Pattern::alternatives`] first.
    pub fn default_priority(&self) -> f64 {
        match self.paths.as_slice() {
            [path] => path.default_priority(),
            paths => paths
                .iter()
                .map(LocationPathPattern::default_priority)
                .fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Splits a union pattern into one pattern per alternative.
    pub fn alternatives(&self) -> Vec<Pattern> {
        self.paths
            .iter()
            .map(|path| Pattern {
                paths: vec![path.clone()],
                namespaces: Arc::clone(&self.namespaces),
                original_text: self.original_text.clone(),
            })
            .collect()
    }
}

impl LocationPathPattern {
    fn default_priority(&self) -> f64 {
        match (self.anchor, self.steps.as_slice()) {
            (Anchor::Relative, [step]) if step.predicates.is_empty() => match step.test {
                StepTest::Name { .. } => 0.0,
                StepTest::NamespaceWildcard(_) => -0.25,
                StepTest::Wildcard | StepTest::NodeType(_) => -0.5,
            },
            _ => 0.5,
        }
    }

    fn matches(
        &self,
        node: &Node,
        namespaces: &NamespaceMap,
        base: &EvaluationContext<'_>,
    ) -> Result<bool, XPathError> {
        if self.steps.is_empty() {
            // Special case for "/"
            return Ok(self.anchor == Anchor::Root && node.node_type() == NodeType::Root);
        }
        self.match_step(self.steps.len() - 1, node, namespaces, base)
    }

    /// Matches `steps[..=index]` with `steps[index]` matching `node`, walking right to left.
    fn match_step(
        &self,
        index: usize,
        node: &Node,
        namespaces: &NamespaceMap,
        base: &EvaluationContext<'_>,
    ) -> Result<bool, XPathError> {
        let step = &self.steps[index];
        if !step.matches(node, namespaces, base)? {
            return Ok(false);
        }

        if index == 0 {
            return Ok(match self.anchor {
                Anchor::Relative | Anchor::RootDescendant => true,
                Anchor::Root => node
                    .parent()
                    .is_some_and(|p| p.node_type() == NodeType::Root),
            });
        }

        let mut candidate = node.parent();
        while let Some(c) = candidate {
            if self.match_step(index - 1, &c, namespaces, base)? {
                return Ok(true);
            }
            if step.separator == Separator::Parent {
                return Ok(false);
            }
            candidate = c.parent();
        }
        Ok(false)
    }
}

impl MatchStep {
    fn test_matches(&self, node: &Node) -> bool {
        let node_type = node.node_type();
        let principal = match self.axis {
            MatchAxis::Attribute => NodeType::Attribute,
            MatchAxis::Child => NodeType::Element,
        };
        if self.axis == MatchAxis::Attribute && node_type != NodeType::Attribute {
            return false;
        }
        if self.axis == MatchAxis::Child && node_type == NodeType::Attribute {
            return false;
        }

        match &self.test {
            StepTest::Wildcard => node_type == principal,
            StepTest::NamespaceWildcard(uri) => {
                node_type == principal
                    && node.name().and_then(|q| q.namespace.as_deref()) == Some(uri.as_str())
            }
            StepTest::Name { namespace, local } => {
                node_type == principal
                    && node
                        .name()
                        .is_some_and(|q| &q.local_part == local && q.namespace == *namespace)
            }
            StepTest::NodeType(ntt) => match ntt {
                NodeTypeTest::Text => node_type == NodeType::Text,
                NodeTypeTest::Comment => node_type == NodeType::Comment,
                NodeTypeTest::ProcessingInstruction => node_type == NodeType::ProcessingInstruction,
                NodeTypeTest::Node => node_type != NodeType::Root,
            },
        }
    }

    fn matches(
        &self,
        node: &Node,
        namespaces: &NamespaceMap,
        base: &EvaluationContext<'_>,
    ) -> Result<bool, XPathError> {
        if !self.test_matches(node) {
            return Ok(false);
        }
        if self.predicates.is_empty() {
            return Ok(true);
        }

        // Predicates see the node among its siblings that pass the same node test.
        let mut candidates: Vec<Node> = match node.parent() {
            Some(parent) => {
                let pool = match self.axis {
                    MatchAxis::Attribute => parent.attributes(),
                    MatchAxis::Child => parent.children(),
                };
                pool.into_iter().filter(|n| self.test_matches(n)).collect()
            }
            None => vec![node.clone()],
        };

        for predicate in &self.predicates {
            let size = candidates.len();
            let mut kept = Vec::with_capacity(size);
            for (i, candidate) in candidates.iter().enumerate() {
                let e_ctx = predicate_context(base, candidate, namespaces, i + 1, size);
                let keep = match xdjango_xpath1::evaluate(predicate, &e_ctx)? {
                    XPathValue::Number(n) => n == (i + 1) as f64,
                    other => other.to_bool(),
                };
                if keep {
                    kept.push(candidate.clone());
                }
            }
            candidates = kept;
        }
        Ok(candidates.contains(node))
    }
}

fn predicate_context<'n>(
    base: &EvaluationContext<'n>,
    node: &'n Node,
    namespaces: &'n NamespaceMap,
    position: usize,
    size: usize,
) -> EvaluationContext<'n> {
    EvaluationContext {
        context_node: node,
        context_position: position,
        context_size: size,
        namespaces: Some(namespaces),
        ..*base
    }
}

// --- Parser ---

/// Parses a pattern, resolving name prefixes against `namespaces`.
pub fn parse(text: &str, namespaces: Arc<NamespaceMap>) -> Result<Pattern, XsltError> {
    let raw_paths = match pattern_parser(text.trim()) {
        Ok(("", paths)) => paths,
        Ok((rem, _)) => {
            return Err(XsltError::XPathParse(
                text.to_string(),
                format!("Unconsumed input in pattern: {}", rem),
            ));
        }
        Err(e) => return Err(XsltError::XPathParse(text.to_string(), e.to_string())),
    };

    let mut paths = Vec::with_capacity(raw_paths.len());
    for (anchor, raw_steps) in raw_paths {
        let mut steps = Vec::with_capacity(raw_steps.len());
        for raw in raw_steps {
            let predicates = raw
                .predicates
                .iter()
                .map(|p| xdjango_xpath1::parse_expression(p))
                .collect::<Result<Vec<_>, _>>()?;
            steps.push(MatchStep {
                axis: raw.axis,
                test: resolve_test(raw.node_test, &namespaces, text)?,
                predicates,
                separator: raw.separator,
            });
        }
        paths.push(LocationPathPattern { anchor, steps });
    }

    Ok(Pattern {
        paths,
        namespaces,
        original_text: text.to_string(),
    })
}

fn resolve_test(
    test: NodeTest,
    namespaces: &NamespaceMap,
    text: &str,
) -> Result<StepTest, XsltError> {
    let lookup = |prefix: &str| {
        namespaces.get(prefix).cloned().ok_or_else(|| {
            XsltError::XPathParse(
                text.to_string(),
                format!("namespace prefix '{}' is not declared", prefix),
            )
        })
    };
    Ok(match test {
        NodeTest::Wildcard => StepTest::Wildcard,
        NodeTest::PrefixWildcard(prefix) => StepTest::NamespaceWildcard(lookup(&prefix)?),
        NodeTest::NodeType(ntt) => StepTest::NodeType(ntt),
        NodeTest::Name(name) => match name.split_once(':') {
            Some((prefix, local)) => StepTest::Name {
                namespace: Some(lookup(prefix)?),
                local: local.to_string(),
            },
            None => StepTest::Name {
                namespace: None,
                local: name,
            },
        },
    })
}

struct RawStep {
    axis: MatchAxis,
    node_test: NodeTest,
    predicates: Vec<String>,
    separator: Separator,
}

/// The text between `[` and its matching `]`, honouring nesting and string literals.
fn predicate_text(input: &str) -> IResult<&str, &str> {
    let Some(body) = input.strip_prefix('[') else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    };
    let mut depth = 1;
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[i + 1..], &body[..i]));
                }
            }
            _ => {}
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::TakeUntil,
    )))
}

fn step_parser(input: &str) -> IResult<&str, RawStep> {
    let (remaining, (axis, node_test)) = alt((
        map(
            preceded(alt((tag("@"), tag("attribute::"))), xpath_parser::node_test),
            |nt| (MatchAxis::Attribute, nt),
        ),
        map(
            preceded(opt(tag("child::")), xpath_parser::node_test),
            |nt| (MatchAxis::Child, nt),
        ),
    ))
    .parse(input)?;
    let (remaining, predicates) = many0(predicate_text).parse(remaining)?;

    Ok((
        remaining,
        RawStep {
            axis,
            node_test,
            predicates: predicates.into_iter().map(str::to_string).collect(),
            separator: Separator::Parent,
        },
    ))
}

fn path_parser(input: &str) -> IResult<&str, (Anchor, Vec<RawStep>)> {
    let (remaining, anchor) = alt((
        map(tag::<&str, &str, nom::error::Error<&str>>("//"), |_| {
            Anchor::RootDescendant
        }),
        map(tag("/"), |_| Anchor::Root),
    ))
    .parse(input)
    .unwrap_or((input, Anchor::Relative));

    let first = step_parser(remaining);
    let (mut remaining, first) = match (anchor, first) {
        (_, Ok((rem, step))) => (rem, step),
        // A lone `/` matches the root node.
        (Anchor::Root, Err(_)) => return Ok((remaining, (anchor, Vec::new()))),
        (_, Err(e)) => return Err(e),
    };

    let mut steps = vec![first];
    loop {
        let (rem, separator) = match alt((
            map(tag::<&str, &str, nom::error::Error<&str>>("//"), |_| {
                Separator::Ancestor
            }),
            map(tag("/"), |_| Separator::Parent),
        ))
        .parse(remaining)
        {
            Ok(found) => found,
            Err(_) => break,
        };
        let (rem, mut step) = step_parser(rem)?;
        step.separator = separator;
        steps.push(step);
        remaining = rem;
    }

    Ok((remaining, (anchor, steps)))
}

fn pattern_parser(input: &str) -> IResult<&str, Vec<(Anchor, Vec<RawStep>)>> {
    let (mut remaining, first) = path_parser(input)?;
    let mut paths = vec![first];
    while let Ok((rem, _)) =
        delimited(multispace0, tag::<&str, &str, nom::error::Error<&str>>("|"), multispace0)
            .parse(remaining)
    {
        let (rem, path) = path_parser(rem)?;
        paths.push(path);
        remaining = rem;
    }
    Ok((remaining, paths))
}
