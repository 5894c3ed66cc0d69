//! Runtime handlers for the instructions of a compiled template body. Each handler is a
//! free function over the executor so that `TemplateExecutor` itself stays a dispatcher.

pub(crate) mod apply_templates;
pub(crate) mod call_template;
pub(crate) mod control_flow;
pub(crate) mod copy;
pub(crate) mod extension;
pub(crate) mod for_each;
pub(crate) mod literals;
pub(crate) mod variables;
