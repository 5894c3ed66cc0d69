use crate::ast::{SortKey, WithParam, XPathExpr};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::executor_handlers::variables::evaluate_with_params;
use crate::output::OutputBuilder;
use xdjango_xpath1::Node;

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_apply_templates<'a>(
    executor: &mut TemplateExecutor<'a>,
    select: Option<&XPathExpr>,
    mode: Option<&str>,
    sort_keys: &[SortKey],
    params: &'a [WithParam],
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let mut nodes = match select {
        Some(expr) => executor.evaluate_nodes(expr, context_node, context_position, context_size)?,
        None => context_node.children(),
    };
    executor.sort_node_set(&mut nodes, sort_keys)?;

    let params =
        evaluate_with_params(executor, params, context_node, context_position, context_size)?;
    executor.apply_templates_to_nodes(&nodes, mode, params, builder)
}
