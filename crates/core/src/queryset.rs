//! The `<xdjango:queryset key="..." dest="..."/>` extension element.
//!
//! The element iterates the context value named by `key`. For each item it binds `dest`
//! in the template context and then either runs its own content or, when it is empty,
//! applies templates, in both cases with a synthetic `<xdjango:{dest}/>` element as the
//! context node. Stylesheets match that element to render one row:
//!
//! ```xml
//! <xdjango:queryset key="posts" dest="post"/>
//!
//! <xsl:template match="xdjango:post">
//!   <h2><xsl:value-of select="xdjango:post.title()"/></h2>
//! </xsl:template>
//! ```

use crate::XDJANGO_NAMESPACE;
use crate::binding::ContextBinding;
use crate::context::ContextValue;
use crate::dispatcher::ContextFunction;
use xdjango_xpath1::{DocumentBuilder, Node, QName};
use xdjango_xslt::{ExecutionError, ExtensionCall};

pub const ELEMENT_NAME: &str = "queryset";

pub(crate) fn execute(
    binding: &ContextBinding<'_>,
    call: &mut ExtensionCall<'_, '_>,
) -> Result<(), ExecutionError> {
    let key = required_attribute(call, "key")?;
    let dest = required_attribute(call, "dest")?;

    let source = {
        let context = binding
            .context
            .try_borrow()
            .map_err(|e| ExecutionError::Extension(e.to_string()))?;
        if key.contains('.') {
            ContextFunction::pass(&context, &key)
                .map_err(|e| ExecutionError::Extension(e.to_string()))?
        } else {
            context.get(&key).cloned().unwrap_or_else(|| {
                log::error!(target: "xdjango::queryset", "'{}' is not in the template context", key);
                ContextValue::Null
            })
        }
    };
    if source.is_null() {
        return Ok(());
    }

    let rows = source
        .iterate()
        .map_err(|e| ExecutionError::Extension(format!("xdjango:queryset key '{}': {}", key, e)))?;
    let row_element = row_element(&dest)?;

    binding.context.borrow_mut().push();
    let mut result = Ok(());
    let mut count = 0usize;
    for row in rows {
        binding.context.borrow_mut().insert(dest.clone(), row);
        result = if call.has_content() {
            call.process_children(&row_element)
        } else {
            call.apply_templates(&row_element)
        };
        binding.context.borrow_mut().remove(&dest);
        if result.is_err() {
            break;
        }
        count += 1;
    }
    binding.context.borrow_mut().pop();
    log::debug!(target: "xdjango::queryset", "'{}' produced {} rows as '{}'", key, count, dest);
    result
}

fn required_attribute(call: &ExtensionCall<'_, '_>, name: &str) -> Result<String, ExecutionError> {
    call.attribute(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ExecutionError::Extension(format!("xdjango:{} requires a '{}' attribute", ELEMENT_NAME, name))
        })
}

/// The `<xdjango:{dest}/>` element rows are rendered against.
fn row_element(dest: &str) -> Result<Node, ExecutionError> {
    let mut builder = DocumentBuilder::new();
    builder.start_element(QName::namespaced(Some("xdjango"), dest, Some(XDJANGO_NAMESPACE)));
    builder.declare_namespace(Some("xdjango"), XDJANGO_NAMESPACE);
    builder.end_element();
    builder
        .finish()
        .document_element()
        .ok_or_else(|| ExecutionError::Extension(format!("cannot build an element named '{}'", dest)))
}
