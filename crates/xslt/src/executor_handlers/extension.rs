use crate::ast::ExtensionInstruction;
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::extension::ExtensionCall;
use crate::output::OutputBuilder;
use xdjango_xpath1::Node;

/// Hands an extension element to the host. When no host implements it, its
/// `xsl:fallback` content runs instead; without a fallback that is an error.
pub(crate) fn handle_extension<'a>(
    executor: &mut TemplateExecutor<'a>,
    instruction: &'a ExtensionInstruction,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let namespace = instruction.name.namespace.as_deref().unwrap_or_default();
    let local = instruction.name.local_part.as_str();

    if let Some(elements) = executor.extensions.elements {
        let mut call = ExtensionCall {
            executor: &mut *executor,
            instruction,
            context_node,
            context_position,
            context_size,
            builder: &mut *builder,
        };
        if let Some(result) = elements.execute_element(namespace, local, &mut call) {
            return result;
        }
    }

    match &instruction.fallback {
        Some(fallback) => {
            log::debug!("Running xsl:fallback for extension element '{}'", instruction.name);
            executor.execute_template(fallback, context_node, context_position, context_size, builder)
        }
        None => Err(ExecutionError::UnknownExtensionElement(
            instruction.name.qualified(),
        )),
    }
}
