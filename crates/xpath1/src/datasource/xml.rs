//! Builds a [`Node`] tree from XML text using `roxmltree`.

use super::builder::DocumentBuilder;
use super::{Node, QName};
use crate::error::XPathError;

/// Parses a complete XML document and returns its root node.
pub fn parse_document(text: &str) -> Result<Node, XPathError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(text, options)
        .map_err(|e| XPathError::XmlSyntax(e.to_string()))?;

    let mut builder = DocumentBuilder::new();
    for child in doc.root().children() {
        append(&mut builder, child);
    }
    Ok(builder.finish())
}

fn element_name(node: roxmltree::Node<'_, '_>) -> QName {
    let tag = node.tag_name();
    let prefix = tag.namespace().and_then(|ns| node.lookup_prefix(ns));
    QName::namespaced(prefix, tag.name(), tag.namespace())
}

fn append(builder: &mut DocumentBuilder, node: roxmltree::Node<'_, '_>) {
    match node.node_type() {
        roxmltree::NodeType::Element => {
            builder.start_element(element_name(node));

            // roxmltree reports every namespace in scope; keep only the ones this element
            // introduces or rebinds.
            let inherited: Vec<(Option<&str>, &str)> = node
                .parent_element()
                .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
                .unwrap_or_default();
            for ns in node.namespaces() {
                if ns.name() == Some("xml") {
                    continue;
                }
                if !inherited.contains(&(ns.name(), ns.uri())) {
                    builder.declare_namespace(ns.name(), ns.uri());
                }
            }

            for attr in node.attributes() {
                let prefix = attr.namespace().and_then(|ns| node.lookup_prefix(ns));
                builder.attribute(
                    QName::namespaced(prefix, attr.name(), attr.namespace()),
                    attr.value(),
                );
            }
            for child in node.children() {
                append(builder, child);
            }
            builder.end_element();
        }
        roxmltree::NodeType::Text => {
            if let Some(text) = node.text() {
                builder.text(text);
            }
        }
        roxmltree::NodeType::Comment => {
            if let Some(text) = node.text() {
                builder.comment(text);
            }
        }
        roxmltree::NodeType::PI => {
            if let Some(pi) = node.pi() {
                builder.processing_instruction(pi.target, pi.value.unwrap_or(""));
            }
        }
        roxmltree::NodeType::Root => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::NodeType;

    #[test]
    fn parses_attributes_and_namespaces() {
        let root = parse_document(
            r#"<x:list xmlns:x="urn:list" id="7"><x:item>one</x:item><?pi data?></x:list>"#,
        )
        .unwrap();
        let list = root.document_element().unwrap();
        let name = list.name().unwrap();
        assert_eq!(name.prefix.as_deref(), Some("x"));
        assert_eq!(name.namespace.as_deref(), Some("urn:list"));
        assert_eq!(list.attribute("id").as_deref(), Some("7"));
        assert_eq!(list.declared_namespaces().len(), 1);

        let children = list.children();
        assert_eq!(children[0].string_value(), "one");
        assert!(children[0].declared_namespaces().is_empty());
        assert_eq!(children[1].node_type(), NodeType::ProcessingInstruction);
    }

    #[test]
    fn reports_syntax_errors() {
        let err = parse_document("<open>").unwrap_err();
        assert!(matches!(err, XPathError::XmlSyntax(_)));
    }
}
