//! The node tree that XPath expressions are evaluated against.
//!
//! A [`Document`] is an immutable arena of nodes, built once (by parsing, or through a
//! [`builder::DocumentBuilder`]) and then shared behind an `Arc`. A [`Node`] is a cheap
//! handle into that arena. Handles from different documents compare by document creation
//! order first, which gives the total document order that node-set unions need.

pub mod builder;
pub mod serialize;
pub mod xml;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// The namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_document_id() -> u64 {
    NEXT_DOCUMENT_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A qualified name, resolved against the namespace declarations in scope where it was read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local_part: String,
    pub namespace: Option<String>,
}

impl QName {
    /// A name in no namespace.
    pub fn local(local_part: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local_part: local_part.into(),
            namespace: None,
        }
    }

    pub fn namespaced(
        prefix: Option<&str>,
        local_part: impl Into<String>,
        namespace: Option<&str>,
    ) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
            local_part: local_part.into(),
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
        }
    }

    /// The name as it is written in markup: `prefix:local` or `local`.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_part),
            None => self.local_part.clone(),
        }
    }

    /// True when both names denote the same expanded name (namespace URI + local part).
    pub fn same_expanded_name(&self, other: &QName) -> bool {
        self.local_part == other.local_part && self.namespace == other.namespace
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

/// The type of a node in the tree, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// A namespace declaration carried by an element: `(prefix, uri)`, where a `None` prefix is
/// the default namespace.
pub type NamespaceDecl = (Option<String>, String);

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Root,
    Element {
        name: QName,
        namespaces: Vec<NamespaceDecl>,
    },
    Attribute {
        name: QName,
        value: String,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: QName,
        data: String,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) attributes: Vec<usize>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind, parent: Option<usize>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

/// An immutable node arena. Index 0 is always the root node.
#[derive(Debug)]
pub struct Document {
    id: u64,
    nodes: Vec<NodeData>,
}

impl Document {
    pub(crate) fn from_nodes(nodes: Vec<NodeData>) -> Arc<Self> {
        Arc::new(Self {
            id: next_document_id(),
            nodes,
        })
    }

    fn data(&self, index: usize) -> &NodeData {
        &self.nodes[index]
    }
}

/// A handle to one node of a shared [`Document`].
#[derive(Clone)]
pub struct Node {
    doc: Arc<Document>,
    index: usize,
}

impl Node {
    pub(crate) fn new(doc: Arc<Document>, index: usize) -> Self {
        Self { doc, index }
    }

    fn data(&self) -> &NodeData {
        self.doc.data(self.index)
    }

    fn sibling(&self, index: usize) -> Node {
        Node::new(Arc::clone(&self.doc), index)
    }

    pub fn node_type(&self) -> NodeType {
        match self.data().kind {
            NodeKind::Root => NodeType::Root,
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Attribute { .. } => NodeType::Attribute,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
        }
    }

    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    /// The expanded name of an element or attribute, or the target of a processing
    /// instruction. `None` for every other node type.
    pub fn name(&self) -> Option<&QName> {
        match &self.data().kind {
            NodeKind::Element { name, .. } | NodeKind::Attribute { name, .. } => Some(name),
            NodeKind::ProcessingInstruction { target, .. } => Some(target),
            _ => None,
        }
    }

    /// The string value of the node, as defined by the XPath 1.0 `string()` function.
    pub fn string_value(&self) -> String {
        match &self.data().kind {
            NodeKind::Attribute { value, .. } => value.clone(),
            NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone(),
            NodeKind::Root | NodeKind::Element { .. } => {
                let mut out = String::new();
                self.collect_text(&mut out);
                out
            }
        }
    }

    fn collect_text(&self, out: &mut String) {
        for &child in &self.data().children {
            match &self.doc.data(child).kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element { .. } => self.sibling(child).collect_text(out),
                _ => {}
            }
        }
    }

    pub fn children(&self) -> Vec<Node> {
        self.data()
            .children
            .iter()
            .map(|&index| self.sibling(index))
            .collect()
    }

    pub fn attributes(&self) -> Vec<Node> {
        self.data()
            .attributes
            .iter()
            .map(|&index| self.sibling(index))
            .collect()
    }

    /// Looks up an attribute value by local name, ignoring attributes in a namespace.
    pub fn attribute(&self, local_name: &str) -> Option<String> {
        self.data().attributes.iter().find_map(|&index| {
            match &self.doc.data(index).kind {
                NodeKind::Attribute { name, value }
                    if name.namespace.is_none() && name.local_part == local_name =>
                {
                    Some(value.clone())
                }
                _ => None,
            }
        })
    }

    pub fn parent(&self) -> Option<Node> {
        self.data().parent.map(|index| self.sibling(index))
    }

    /// The root node of the document this node belongs to.
    pub fn root(&self) -> Node {
        self.sibling(0)
    }

    /// The first element child of the root, if any.
    pub fn document_element(&self) -> Option<Node> {
        self.root().children().into_iter().find(Node::is_element)
    }

    /// Namespace declarations written on this element.
    pub fn declared_namespaces(&self) -> &[NamespaceDecl] {
        match &self.data().kind {
            NodeKind::Element { namespaces, .. } => namespaces,
            _ => &[],
        }
    }

    /// Resolves a prefix (`None` for the default namespace) against the declarations on this
    /// node and its ancestors.
    pub fn lookup_namespace(&self, prefix: Option<&str>) -> Option<String> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE.to_string());
        }
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if let Some((_, uri)) = node
                .declared_namespaces()
                .iter()
                .find(|(p, _)| p.as_deref() == prefix)
            {
                return (!uri.is_empty()).then(|| uri.clone());
            }
            current = node.parent();
        }
        None
    }

    /// A stable identifier, unique across every document in the process.
    pub fn unique_id(&self) -> String {
        format!("d{}n{}", self.doc.id, self.index)
    }

    pub(crate) fn kind(&self) -> &NodeKind {
        &self.data().kind
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.doc.id == other.doc.id && self.index == other.index
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.doc.id.hash(state);
        self.index.hash(state);
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.doc.id, self.index).cmp(&(other.doc.id, other.index))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data().kind {
            NodeKind::Root => write!(f, "Root({})", self.unique_id()),
            NodeKind::Element { name, .. } => write!(f, "Element({}, {})", name, self.unique_id()),
            NodeKind::Attribute { name, value } => write!(f, "Attribute({}={:?})", name, value),
            NodeKind::Text(text) => write!(f, "Text({:?})", text),
            NodeKind::Comment(text) => write!(f, "Comment({:?})", text),
            NodeKind::ProcessingInstruction { target, .. } => write!(f, "PI({})", target),
        }
    }
}
