use crate::ast::WithParam;
use crate::executor::{ExecutionError, TemplateExecutor};
use xdjango_xpath1::{Node, XPathValue};

/// Evaluates `xsl:with-param` values in the caller's context, before the callee's scope
/// exists.
pub(crate) fn evaluate_with_params<'a>(
    executor: &mut TemplateExecutor<'a>,
    params: &'a [WithParam],
    context_node: &Node,
    context_position: usize,
    context_size: usize,
) -> Result<Vec<(String, XPathValue)>, ExecutionError> {
    params
        .iter()
        .map(|param| {
            let value = executor.evaluate_binding(
                &param.value,
                context_node,
                context_position,
                context_size,
            )?;
            Ok((param.name.clone(), value))
        })
        .collect()
}
