use crate::ast::WithParam;
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::executor_handlers::variables::evaluate_with_params;
use crate::output::OutputBuilder;
use xdjango_xpath1::Node;

pub(crate) fn handle_call_template<'a>(
    executor: &mut TemplateExecutor<'a>,
    name: &str,
    params: &'a [WithParam],
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let stylesheet = executor.stylesheet;
    let Some(template) = stylesheet.named_templates.get(name) else {
        return Err(ExecutionError::UnknownNamedTemplate(name.to_string()));
    };

    let passed_params =
        evaluate_with_params(executor, params, context_node, context_position, context_size)?;
    for (passed_name, _) in &passed_params {
        if !template.params.iter().any(|p| &p.name == passed_name) {
            log::debug!(
                "Call to template '{}' passes undeclared parameter '{}'; ignoring it",
                name,
                passed_name
            );
        }
    }

    // Named templates see only global variables and their own parameters.
    let caller_scopes = executor.variable_stack.split_off(1);
    executor.push_scope();
    let result = executor
        .bind_params(
            &template.params,
            passed_params,
            context_node,
            context_position,
            context_size,
        )
        .and_then(|_| {
            executor.execute_template(
                &template.body,
                context_node,
                context_position,
                context_size,
                builder,
            )
        });
    executor.pop_scope();
    executor.variable_stack.extend(caller_scopes);
    result
}
