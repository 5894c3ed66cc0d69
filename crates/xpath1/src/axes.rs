//! Contains pure functions for collecting nodes along each XPath axis.
//!
//! Every collector returns its nodes in axis order: document order for forward axes,
//! reverse document order for `ancestor`, `ancestor-or-self`, `preceding` and
//! `preceding-sibling`.

use crate::datasource::{Node, NodeType};

fn is_attribute(node: &Node) -> bool {
    node.node_type() == NodeType::Attribute
}

pub fn collect_child_nodes(node: &Node) -> Vec<Node> {
    node.children()
}

pub fn collect_attribute_nodes(node: &Node) -> Vec<Node> {
    node.attributes()
}

fn push_descendants(node: &Node, results: &mut Vec<Node>) {
    for child in node.children() {
        results.push(child.clone());
        push_descendants(&child, results);
    }
}

pub fn collect_descendant_nodes(node: &Node) -> Vec<Node> {
    let mut results = Vec::new();
    push_descendants(node, &mut results);
    results
}

pub fn collect_descendant_or_self_nodes(node: &Node) -> Vec<Node> {
    let mut results = vec![node.clone()];
    push_descendants(node, &mut results);
    results
}

pub fn collect_parent_nodes(node: &Node) -> Vec<Node> {
    node.parent().into_iter().collect()
}

pub fn collect_ancestor_nodes(node: &Node) -> Vec<Node> {
    let mut results = Vec::new();
    let mut current = node.parent();
    while let Some(p) = current {
        current = p.parent();
        results.push(p);
    }
    results
}

pub fn collect_ancestor_or_self_nodes(node: &Node) -> Vec<Node> {
    let mut results = vec![node.clone()];
    results.extend(collect_ancestor_nodes(node));
    results
}

/// Siblings before and after `node` among its parent's children. Attributes and the root
/// have no siblings.
fn split_siblings(node: &Node) -> (Vec<Node>, Vec<Node>) {
    if is_attribute(node) {
        return (Vec::new(), Vec::new());
    }
    let Some(parent) = node.parent() else {
        return (Vec::new(), Vec::new());
    };
    let siblings = parent.children();
    match siblings.iter().position(|s| s == node) {
        Some(at) => (siblings[..at].to_vec(), siblings[at + 1..].to_vec()),
        None => (Vec::new(), Vec::new()),
    }
}

pub fn collect_following_sibling_nodes(node: &Node) -> Vec<Node> {
    split_siblings(node).1
}

pub fn collect_preceding_sibling_nodes(node: &Node) -> Vec<Node> {
    let mut preceding = split_siblings(node).0;
    preceding.reverse();
    preceding
}

pub fn collect_following_nodes(node: &Node) -> Vec<Node> {
    let mut results = Vec::new();
    // The following axis of an attribute starts with its element's content.
    let start = if is_attribute(node) {
        match node.parent() {
            Some(element) => {
                push_descendants(&element, &mut results);
                element
            }
            None => return results,
        }
    } else {
        node.clone()
    };

    let mut current = Some(start);
    while let Some(c) = current {
        for sibling in split_siblings(&c).1 {
            results.push(sibling.clone());
            push_descendants(&sibling, &mut results);
        }
        current = c.parent();
    }
    results
}

pub fn collect_preceding_nodes(node: &Node) -> Vec<Node> {
    let start = if is_attribute(node) {
        node.parent()
    } else {
        Some(node.clone())
    };

    let mut results = Vec::new();
    let mut current = start;
    while let Some(c) = current {
        for sibling in split_siblings(&c).0.iter().rev() {
            let mut subtree = collect_descendant_or_self_nodes(sibling);
            subtree.reverse();
            results.extend(subtree);
        }
        current = c.parent();
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::xml::parse_document;

    // root > doc > [para#p1 > "Hello", !--c--, div > para > "World", ?pi?]
    fn tree() -> Node {
        parse_document(r#"<doc><para id="p1">Hello</para><!--c--><div><para>World</para></div><?pi x?></doc>"#)
            .unwrap()
    }

    fn describe(nodes: &[Node]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| match n.name() {
                Some(name) if n.is_element() => name.local_part.clone(),
                _ => format!("{:?}", n.node_type()),
            })
            .collect()
    }

    #[test]
    fn test_collect_child() {
        let doc = tree().document_element().unwrap();
        assert_eq!(
            describe(&collect_child_nodes(&doc)),
            vec!["para", "Comment", "div", "ProcessingInstruction"]
        );
    }

    #[test]
    fn test_collect_ancestor() {
        let root = tree();
        let text = collect_descendant_nodes(&root)
            .into_iter()
            .find(|n| n.string_value() == "World" && n.node_type() == NodeType::Text)
            .unwrap();
        assert_eq!(describe(&collect_ancestor_nodes(&text)), vec!["para", "div", "doc", "Root"]);
        assert_eq!(collect_ancestor_or_self_nodes(&text).len(), 5);
    }

    #[test]
    fn test_collect_descendant_is_document_order() {
        let root = tree();
        let descendants = collect_descendant_nodes(&root);
        let mut sorted = descendants.clone();
        sorted.sort();
        assert_eq!(descendants, sorted);
        assert_eq!(descendants.len(), 8);
    }

    #[test]
    fn test_collect_siblings() {
        let doc = tree().document_element().unwrap();
        let children = doc.children();
        let (para, div) = (&children[0], &children[2]);
        assert_eq!(
            describe(&collect_following_sibling_nodes(para)),
            vec!["Comment", "div", "ProcessingInstruction"]
        );
        assert_eq!(
            describe(&collect_preceding_sibling_nodes(div)),
            vec!["Comment", "para"]
        );
        let attr = &para.attributes()[0];
        assert!(collect_following_sibling_nodes(attr).is_empty());
    }

    #[test]
    fn test_collect_following_preceding() {
        let doc = tree().document_element().unwrap();
        let children = doc.children();
        let hello = children[0].children()[0].clone();
        assert_eq!(
            describe(&collect_following_nodes(&hello)),
            vec!["Comment", "div", "para", "Text", "ProcessingInstruction"]
        );
        assert_eq!(
            describe(&collect_preceding_nodes(&children[2])),
            vec!["Comment", "Text", "para"]
        );
        let attr = children[0].attributes()[0].clone();
        assert_eq!(describe(&collect_following_nodes(&attr))[0], "Text");
    }
}
