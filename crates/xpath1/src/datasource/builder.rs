//! Incremental construction of a [`Document`].
//!
//! The builder appends nodes in document order, so the arena index of every node is also
//! its position in document order.

use super::{Document, NodeData, NodeKind, Node, QName};

#[derive(Debug)]
pub struct DocumentBuilder {
    nodes: Vec<NodeData>,
    open: Vec<usize>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Root, None)],
            open: vec![0],
        }
    }

    fn current(&self) -> usize {
        self.open.last().copied().unwrap_or(0)
    }

    fn push_child(&mut self, kind: NodeKind) -> usize {
        let parent = self.current();
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind, Some(parent)));
        self.nodes[parent].children.push(index);
        index
    }

    pub fn start_element(&mut self, name: QName) {
        let index = self.push_child(NodeKind::Element {
            name,
            namespaces: Vec::new(),
        });
        self.open.push(index);
    }

    pub fn end_element(&mut self) {
        if self.open.len() > 1 {
            self.open.pop();
        }
    }

    /// True while an element is open, i.e. when attributes can still be attached.
    pub fn in_element(&self) -> bool {
        self.open.len() > 1
    }

    /// True once the open element (or the root) has received any child node.
    pub fn current_has_children(&self) -> bool {
        !self.nodes[self.current()].children.is_empty()
    }

    /// Records a namespace declaration on the open element. A repeated prefix keeps the
    /// first binding.
    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        let current = self.current();
        if let NodeKind::Element { namespaces, .. } = &mut self.nodes[current].kind {
            let prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);
            if !namespaces.iter().any(|(p, _)| *p == prefix) {
                namespaces.push((prefix, uri.to_string()));
            }
        }
    }

    /// Sets an attribute on the open element, replacing an attribute with the same expanded
    /// name. Returns false when no element is open.
    pub fn attribute(&mut self, name: QName, value: impl Into<String>) -> bool {
        if !self.in_element() {
            return false;
        }
        let current = self.current();
        let value = value.into();
        let existing = self.nodes[current].attributes.iter().copied().find(|&index| {
            matches!(&self.nodes[index].kind, NodeKind::Attribute { name: n, .. } if n.same_expanded_name(&name))
        });
        match existing {
            Some(index) => {
                self.nodes[index].kind = NodeKind::Attribute { name, value };
            }
            None => {
                let index = self.nodes.len();
                self.nodes
                    .push(NodeData::new(NodeKind::Attribute { name, value }, Some(current)));
                self.nodes[current].attributes.push(index);
            }
        }
        true
    }

    /// Appends text, merging with a directly preceding text node.
    pub fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let current = self.current();
        if let Some(&last) = self.nodes[current].children.last()
            && let NodeKind::Text(existing) = &mut self.nodes[last].kind
        {
            existing.push_str(text);
            return;
        }
        self.push_child(NodeKind::Text(text.to_string()));
    }

    pub fn comment(&mut self, text: &str) {
        self.push_child(NodeKind::Comment(text.to_string()));
    }

    pub fn processing_instruction(&mut self, target: &str, data: &str) {
        self.push_child(NodeKind::ProcessingInstruction {
            target: QName::local(target),
            data: data.to_string(),
        });
    }

    /// Deep-copies `node` into the current position. A root node contributes its children,
    /// an attribute node becomes an attribute of the open element.
    pub fn copy_node(&mut self, node: &Node) {
        match node.kind() {
            NodeKind::Root => {
                for child in node.children() {
                    self.copy_node(&child);
                }
            }
            NodeKind::Element { name, namespaces } => {
                self.start_element(name.clone());
                for (prefix, uri) in namespaces {
                    self.declare_namespace(prefix.as_deref(), uri);
                }
                for attr in node.attributes() {
                    self.copy_node(&attr);
                }
                for child in node.children() {
                    self.copy_node(&child);
                }
                self.end_element();
            }
            NodeKind::Attribute { name, value } => {
                self.attribute(name.clone(), value.clone());
            }
            NodeKind::Text(text) => self.text(text),
            NodeKind::Comment(text) => self.comment(text),
            NodeKind::ProcessingInstruction { target, data } => {
                self.processing_instruction(&target.local_part, data)
            }
        }
    }

    /// Closes any open elements and returns the root node of the finished document.
    pub fn finish(self) -> Node {
        Node::new(Document::from_nodes(self.nodes), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::NodeType;

    #[test]
    fn builds_in_document_order() {
        let mut builder = DocumentBuilder::new();
        builder.start_element(QName::local("users"));
        builder.start_element(QName::local("user"));
        assert!(builder.attribute(QName::local("name"), "ann"));
        builder.text("a");
        builder.text("b");
        builder.end_element();
        builder.end_element();
        let root = builder.finish();

        let users = root.document_element().unwrap();
        let user = &users.children()[0];
        assert_eq!(user.attribute("name").as_deref(), Some("ann"));
        assert_eq!(user.children().len(), 1);
        assert_eq!(user.string_value(), "ab");
        assert!(users < *user);
    }

    #[test]
    fn attribute_replaces_same_name_and_needs_an_element() {
        let mut builder = DocumentBuilder::new();
        assert!(!builder.attribute(QName::local("orphan"), "x"));
        builder.start_element(QName::local("a"));
        builder.attribute(QName::local("k"), "1");
        builder.attribute(QName::local("k"), "2");
        builder.end_element();
        let a = builder.finish().document_element().unwrap();
        assert_eq!(a.attributes().len(), 1);
        assert_eq!(a.attribute("k").as_deref(), Some("2"));
    }

    #[test]
    fn copy_node_of_root_copies_children() {
        let mut source = DocumentBuilder::new();
        source.start_element(QName::local("x"));
        source.comment("c");
        source.end_element();
        let source = source.finish();

        let mut target = DocumentBuilder::new();
        target.start_element(QName::local("wrap"));
        target.copy_node(&source);
        target.end_element();
        let wrap = target.finish().document_element().unwrap();
        let x = &wrap.children()[0];
        assert_eq!(x.name().map(|n| n.local_part.as_str()), Some("x"));
        assert_eq!(x.children()[0].node_type(), NodeType::Comment);
    }
}
