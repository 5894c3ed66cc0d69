use crate::ast::{PreparsedTemplate, SortKey, XPathExpr};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use xdjango_xpath1::Node;

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_for_each<'a>(
    executor: &mut TemplateExecutor<'a>,
    select: &XPathExpr,
    sort_keys: &[SortKey],
    body: &'a PreparsedTemplate,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let mut nodes = executor.evaluate_nodes(select, context_node, context_position, context_size)?;
    executor.sort_node_set(&mut nodes, sort_keys)?;

    let inner_context_size = nodes.len();
    for (i, node) in nodes.iter().enumerate() {
        executor.execute_template(body, node, i + 1, inner_context_size, builder)?;
    }
    Ok(())
}
