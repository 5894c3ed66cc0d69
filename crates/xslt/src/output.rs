//! Defines the `OutputBuilder` trait, which decouples the XSLT executor
//! from the concrete result tree.

use xdjango_xpath1::{DocumentBuilder, Node, QName};

/// A trait that describes the semantic actions of building the result tree,
/// without exposing the underlying concrete node types.
pub trait OutputBuilder {
    fn start_element(&mut self, name: QName);
    fn end_element(&mut self);

    /// Records a namespace binding on the currently open element.
    fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str);

    /// Sets an attribute on the currently open element. Returns false if there is none,
    /// or if the element already has children.
    fn attribute(&mut self, name: QName, value: &str) -> bool;

    fn text(&mut self, text: &str);
    fn comment(&mut self, text: &str);
    fn processing_instruction(&mut self, target: &str, data: &str);

    /// Deep-copies an existing node into the output.
    fn copy_node(&mut self, node: &Node);
}

impl OutputBuilder for DocumentBuilder {
    fn start_element(&mut self, name: QName) {
        DocumentBuilder::start_element(self, name);
    }

    fn end_element(&mut self) {
        DocumentBuilder::end_element(self);
    }

    fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        DocumentBuilder::declare_namespace(self, prefix, uri);
    }

    fn attribute(&mut self, name: QName, value: &str) -> bool {
        if self.current_has_children() {
            return false;
        }
        DocumentBuilder::attribute(self, name, value)
    }

    fn text(&mut self, text: &str) {
        DocumentBuilder::text(self, text);
    }

    fn comment(&mut self, text: &str) {
        DocumentBuilder::comment(self, text);
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        DocumentBuilder::processing_instruction(self, target, data);
    }

    fn copy_node(&mut self, node: &Node) {
        DocumentBuilder::copy_node(self, node);
    }
}

/// Collects only character data, for instructions whose content becomes a string
/// (`xsl:attribute`, `xsl:comment`, `xsl:message` and friends).
#[derive(Debug, Default)]
pub(crate) struct TextCollector(pub String);

impl OutputBuilder for TextCollector {
    fn start_element(&mut self, _: QName) {}
    fn end_element(&mut self) {}
    fn declare_namespace(&mut self, _: Option<&str>, _: &str) {}
    fn attribute(&mut self, _: QName, _: &str) -> bool {
        false
    }
    fn text(&mut self, text: &str) {
        self.0.push_str(text);
    }
    fn comment(&mut self, _: &str) {}
    fn processing_instruction(&mut self, _: &str, _: &str) {}
    fn copy_node(&mut self, node: &Node) {
        use xdjango_xpath1::NodeType;
        match node.node_type() {
            NodeType::Root | NodeType::Element | NodeType::Text => {
                self.0.push_str(&node.string_value())
            }
            _ => {}
        }
    }
}
