//! Binary operators: comparisons with the XPath 1.0 node-set rules, arithmetic and union.
//! `and`/`or` short-circuit in the engine and never reach this module.

use super::ast::BinaryOperator;
use super::engine::{XPathValue, string_to_number};
use crate::error::XPathError;

pub fn evaluate(
    op: BinaryOperator,
    left: XPathValue,
    right: XPathValue,
) -> Result<XPathValue, XPathError> {
    match op {
        BinaryOperator::Or => Ok(XPathValue::Boolean(left.to_bool() || right.to_bool())),
        BinaryOperator::And => Ok(XPathValue::Boolean(left.to_bool() && right.to_bool())),
        BinaryOperator::Equals
        | BinaryOperator::NotEquals
        | BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => Ok(XPathValue::Boolean(compare(op, &left, &right))),
        BinaryOperator::Plus => Ok(XPathValue::Number(left.to_number() + right.to_number())),
        BinaryOperator::Minus => Ok(XPathValue::Number(left.to_number() - right.to_number())),
        BinaryOperator::Multiply => Ok(XPathValue::Number(left.to_number() * right.to_number())),
        BinaryOperator::Divide => Ok(XPathValue::Number(left.to_number() / right.to_number())),
        // Rust's `%` truncates like XPath's `mod`: the result takes the dividend's sign.
        BinaryOperator::Modulo => Ok(XPathValue::Number(left.to_number() % right.to_number())),
        BinaryOperator::Union => union(left, right),
    }
}

fn union(left: XPathValue, right: XPathValue) -> Result<XPathValue, XPathError> {
    let (XPathValue::NodeSet(mut nodes), XPathValue::NodeSet(other)) = (left, right) else {
        return Err(XPathError::TypeError(
            "the union operator '|' requires node-sets on both sides".to_string(),
        ));
    };
    nodes.extend(other);
    nodes.sort();
    nodes.dedup();
    Ok(XPathValue::NodeSet(nodes))
}

fn is_equality(op: BinaryOperator) -> bool {
    matches!(op, BinaryOperator::Equals | BinaryOperator::NotEquals)
}

fn compare_numbers(op: BinaryOperator, a: f64, b: f64) -> bool {
    match op {
        BinaryOperator::Equals => a == b,
        BinaryOperator::NotEquals => a != b,
        BinaryOperator::LessThan => a < b,
        BinaryOperator::LessThanOrEqual => a <= b,
        BinaryOperator::GreaterThan => a > b,
        BinaryOperator::GreaterThanOrEqual => a >= b,
        _ => false,
    }
}

fn compare_strings(op: BinaryOperator, a: &str, b: &str) -> bool {
    match op {
        BinaryOperator::Equals => a == b,
        BinaryOperator::NotEquals => a != b,
        _ => compare_numbers(op, string_to_number(a), string_to_number(b)),
    }
}

/// The mirror of a relational operator, used when the node-set is on the right.
fn flip(op: BinaryOperator) -> BinaryOperator {
    match op {
        BinaryOperator::LessThan => BinaryOperator::GreaterThan,
        BinaryOperator::LessThanOrEqual => BinaryOperator::GreaterThanOrEqual,
        BinaryOperator::GreaterThan => BinaryOperator::LessThan,
        BinaryOperator::GreaterThanOrEqual => BinaryOperator::LessThanOrEqual,
        other => other,
    }
}

fn compare(op: BinaryOperator, left: &XPathValue, right: &XPathValue) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(a), XPathValue::NodeSet(b)) => {
            let right_values: Vec<String> = b.iter().map(|n| n.string_value()).collect();
            a.iter().any(|n| {
                let left_value = n.string_value();
                right_values
                    .iter()
                    .any(|r| compare_strings(op, &left_value, r))
            })
        }
        (XPathValue::NodeSet(nodes), other) => compare_node_set(op, nodes, other),
        (other, XPathValue::NodeSet(nodes)) => compare_node_set(flip(op), nodes, other),
        (a, b) if is_equality(op) => {
            let equal = match (a, b) {
                (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => a.to_bool() == b.to_bool(),
                (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
                    a.to_number() == b.to_number()
                }
                _ => a.to_string() == b.to_string(),
            };
            if op == BinaryOperator::Equals {
                equal
            } else {
                !equal
            }
        }
        (a, b) => compare_numbers(op, a.to_number(), b.to_number()),
    }
}

/// Compares every node of `nodes` (as the left operand) against a non-node-set value.
fn compare_node_set(op: BinaryOperator, nodes: &[crate::datasource::Node], other: &XPathValue) -> bool {
    match other {
        XPathValue::Boolean(b) => {
            let left = !nodes.is_empty();
            if is_equality(op) {
                (left == *b) == (op == BinaryOperator::Equals)
            } else {
                compare_numbers(op, f64::from(u8::from(left)), f64::from(u8::from(*b)))
            }
        }
        XPathValue::Number(n) => nodes
            .iter()
            .any(|node| compare_numbers(op, string_to_number(&node.string_value()), *n)),
        XPathValue::String(s) => nodes
            .iter()
            .any(|node| compare_strings(op, &node.string_value(), s)),
        XPathValue::NodeSet(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::xml::parse_document;

    fn node_set(xml: &str) -> XPathValue {
        let root = parse_document(xml).unwrap();
        XPathValue::NodeSet(root.document_element().unwrap().children())
    }

    #[test]
    fn node_set_equality_is_existential() {
        let items = node_set("<l><i>1</i><i>2</i></l>");
        assert!(evaluate(BinaryOperator::Equals, items.clone(), XPathValue::Number(2.0)).unwrap().to_bool());
        // Both = and != can hold at once for a node-set.
        assert!(evaluate(BinaryOperator::NotEquals, items.clone(), XPathValue::Number(2.0)).unwrap().to_bool());
        assert!(!evaluate(BinaryOperator::Equals, items, XPathValue::from("3")).unwrap().to_bool());
    }

    #[test]
    fn relational_operators_flip_for_right_hand_node_sets() {
        let items = node_set("<l><i>5</i></l>");
        assert!(evaluate(BinaryOperator::LessThan, XPathValue::Number(3.0), items.clone()).unwrap().to_bool());
        assert!(!evaluate(BinaryOperator::GreaterThan, XPathValue::Number(3.0), items).unwrap().to_bool());
    }

    #[test]
    fn scalar_equality_prefers_booleans_then_numbers() {
        let eq = |a: XPathValue, b: XPathValue| evaluate(BinaryOperator::Equals, a, b).unwrap().to_bool();
        assert!(eq(XPathValue::Boolean(true), XPathValue::from("x")));
        assert!(eq(XPathValue::Number(1.0), XPathValue::from(" 1 ")));
        assert!(!eq(XPathValue::from("1.0"), XPathValue::from("1")));
    }

    #[test]
    fn arithmetic_follows_ieee_rules() {
        let div = evaluate(BinaryOperator::Divide, XPathValue::Number(1.0), XPathValue::Number(0.0)).unwrap();
        assert_eq!(div.to_string(), "Infinity");
        let modulo = evaluate(BinaryOperator::Modulo, XPathValue::Number(-5.0), XPathValue::Number(2.0)).unwrap();
        assert_eq!(modulo.to_number(), -1.0);
    }

    #[test]
    fn union_requires_node_sets() {
        let err = evaluate(BinaryOperator::Union, XPathValue::Number(1.0), node_set("<a/>")).unwrap_err();
        assert!(matches!(err, XPathError::TypeError(_)));
    }
}
