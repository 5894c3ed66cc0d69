//! The seams through which a host application plugs into compilation and execution:
//! extension-function namespaces checked at compile time, and extension elements
//! dispatched at run time.

use crate::ast::ExtensionInstruction;
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use std::collections::HashMap;
use std::sync::Arc;
use xdjango_xpath1::{ExtensionFunctions, Node, QName};

/// A namespace of extension functions known at compile time. A prefixed call whose
/// namespace is registered but which `has_function` rejects is a compile error.
pub trait FunctionNamespace: Send + Sync {
    fn has_function(&self, local_name: &str) -> bool;
}

pub type FunctionNamespaces = HashMap<String, Arc<dyn FunctionNamespace>>;

/// Executes elements in extension namespaces. Implementations answer `None` for elements
/// they do not provide, in which case the element's `xsl:fallback` runs.
pub trait ExtensionElements {
    fn execute_element(
        &self,
        namespace_uri: &str,
        local_name: &str,
        call: &mut ExtensionCall<'_, '_>,
    ) -> Option<Result<(), ExecutionError>>;
}

/// The host objects one execution runs with.
#[derive(Clone, Copy, Default)]
pub struct Extensions<'h> {
    pub functions: Option<&'h dyn ExtensionFunctions>,
    pub elements: Option<&'h dyn ExtensionElements>,
}

impl<'h> Extensions<'h> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_functions(mut self, functions: &'h dyn ExtensionFunctions) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_elements(mut self, elements: &'h dyn ExtensionElements) -> Self {
        self.elements = Some(elements);
        self
    }
}

/// One invocation of an extension element, giving the implementation access to the
/// element as written and to the running transformation.
pub struct ExtensionCall<'c, 'a> {
    pub(crate) executor: &'c mut TemplateExecutor<'a>,
    pub(crate) instruction: &'a ExtensionInstruction,
    pub(crate) context_node: &'c Node,
    pub(crate) context_position: usize,
    pub(crate) context_size: usize,
    pub(crate) builder: &'c mut dyn OutputBuilder,
}

impl<'c, 'a> ExtensionCall<'c, 'a> {
    pub fn name(&self) -> &QName {
        &self.instruction.name
    }

    /// The value of a no-namespace attribute, exactly as written in the stylesheet.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.instruction
            .attributes
            .iter()
            .find(|(name, _)| name.namespace.is_none() && name.local_part == local_name)
            .map(|(_, value)| value.as_str())
    }

    pub fn context_node(&self) -> &Node {
        self.context_node
    }

    pub fn context_position(&self) -> usize {
        self.context_position
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    /// True if the element has instructions of its own (ignoring `xsl:fallback`).
    pub fn has_content(&self) -> bool {
        !self.instruction.body.0.is_empty()
    }

    /// Runs the element's content with `node` as the context node.
    pub fn process_children(&mut self, node: &Node) -> Result<(), ExecutionError> {
        let instruction = self.instruction;
        self.executor
            .execute_template(&instruction.body, node, 1, 1, &mut *self.builder)
    }

    /// Applies template rules of the current mode to `node`.
    pub fn apply_templates(&mut self, node: &Node) -> Result<(), ExecutionError> {
        let mode = self.executor.current_mode.clone();
        self.executor.apply_templates_to_nodes(
            std::slice::from_ref(node),
            mode.as_deref(),
            Vec::new(),
            &mut *self.builder,
        )
    }

    pub fn builder(&mut self) -> &mut dyn OutputBuilder {
        &mut *self.builder
    }
}
