use crate::ast::PreparsedTemplate;
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use xdjango_xpath1::{Node, NodeType, XPathValue};

/// `xsl:copy-of`: node-sets are deep-copied, anything else is written as text.
pub(crate) fn handle_copy_of(result: XPathValue, builder: &mut dyn OutputBuilder) {
    match result {
        XPathValue::NodeSet(nodes) => {
            for node in &nodes {
                builder.copy_node(node);
            }
        }
        other => {
            let content = other.to_string();
            if !content.is_empty() {
                builder.text(&content);
            }
        }
    }
}

/// `xsl:copy`: a shallow copy of the context node, with the body as its content.
pub(crate) fn handle_copy<'a>(
    executor: &mut TemplateExecutor<'a>,
    body: &'a PreparsedTemplate,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    match context_node.node_type() {
        NodeType::Element => {
            if let Some(name) = context_node.name() {
                builder.start_element(name.clone());
            }
            for (prefix, uri) in context_node.declared_namespaces() {
                builder.declare_namespace(prefix.as_deref(), uri);
            }
            executor.execute_template(body, context_node, context_position, context_size, builder)?;
            builder.end_element();
        }
        NodeType::Root => {
            executor.execute_template(body, context_node, context_position, context_size, builder)?;
        }
        NodeType::Text | NodeType::Attribute | NodeType::Comment | NodeType::ProcessingInstruction => {
            builder.copy_node(context_node);
        }
    }
    Ok(())
}
