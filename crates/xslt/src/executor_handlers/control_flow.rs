use crate::ast::{PreparsedTemplate, When, XPathExpr};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use xdjango_xpath1::Node;

pub(crate) fn handle_if<'a>(
    executor: &mut TemplateExecutor<'a>,
    test: &XPathExpr,
    body: &'a PreparsedTemplate,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    if executor
        .evaluate(test, context_node, context_position, context_size)?
        .to_bool()
    {
        executor.execute_template(body, context_node, context_position, context_size, builder)?;
    }
    Ok(())
}

pub(crate) fn handle_choose<'a>(
    executor: &mut TemplateExecutor<'a>,
    whens: &'a [When],
    otherwise: Option<&'a PreparsedTemplate>,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let mut chosen = otherwise;
    for when in whens {
        if executor
            .evaluate(&when.test, context_node, context_position, context_size)?
            .to_bool()
        {
            chosen = Some(&when.body);
            break;
        }
    }
    if let Some(body) = chosen {
        executor.execute_template(body, context_node, context_position, context_size, builder)?;
    }
    Ok(())
}

pub(crate) fn handle_message<'a>(
    executor: &mut TemplateExecutor<'a>,
    body: &'a PreparsedTemplate,
    terminate: bool,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
) -> Result<(), ExecutionError> {
    let message = executor.collect_text(body, context_node, context_position, context_size)?;
    if terminate {
        log::error!("xsl:message: {}", message);
        Err(ExecutionError::Terminated(message))
    } else {
        log::info!("xsl:message: {}", message);
        Ok(())
    }
}
