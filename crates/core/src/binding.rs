//! Connects one execution's template context to the XSLT engine.

use crate::XDJANGO_NAMESPACE;
use crate::context::TemplateContext;
use crate::queryset;
use crate::registry::ContextFunctionRegistry;
use std::cell::RefCell;
use xdjango_xpath1::{ExtensionFunctions, XPathError, XPathValue};
use xdjango_xslt::{ExecutionError, ExtensionCall, ExtensionElements};

/// The extension functions and elements of a single execution, borrowing the
/// transformer's registry and owning the context it runs with.
pub(crate) struct ContextBinding<'t> {
    registry: &'t ContextFunctionRegistry,
    pub(crate) context: RefCell<TemplateContext>,
}

impl<'t> ContextBinding<'t> {
    pub(crate) fn new(registry: &'t ContextFunctionRegistry, context: TemplateContext) -> Self {
        Self {
            registry,
            context: RefCell::new(context),
        }
    }
}

impl ExtensionFunctions for ContextBinding<'_> {
    fn call(
        &self,
        namespace_uri: &str,
        local_name: &str,
        args: Vec<XPathValue>,
    ) -> Option<Result<XPathValue, XPathError>> {
        if namespace_uri != XDJANGO_NAMESPACE {
            return None;
        }
        let function = self.registry.get(local_name)?;
        let result = match self.context.try_borrow() {
            Ok(context) => Ok(function.dispatch(&context, local_name, args)),
            Err(_) => Err(XPathError::function(
                local_name,
                "the template context is being modified",
            )),
        };
        Some(result)
    }
}

impl ExtensionElements for ContextBinding<'_> {
    fn execute_element(
        &self,
        namespace_uri: &str,
        local_name: &str,
        call: &mut ExtensionCall<'_, '_>,
    ) -> Option<Result<(), ExecutionError>> {
        match (namespace_uri, local_name) {
            (XDJANGO_NAMESPACE, queryset::ELEMENT_NAME) => Some(queryset::execute(self, call)),
            _ => None,
        }
    }
}
