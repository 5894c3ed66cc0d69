//! Handlers for literal output: text, `value-of`, literal result elements, and the
//! computed `xsl:element` and `xsl:attribute`.

use crate::ast::{AttributeValueTemplate, PreparsedTemplate, XPathExpr};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use xdjango_xpath1::{NamespaceMap, Node, QName};

pub(crate) fn handle_text(text: &str, builder: &mut dyn OutputBuilder) {
    builder.text(text);
}

pub(crate) fn handle_value_of(
    executor: &TemplateExecutor<'_>,
    select: &XPathExpr,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let result = executor.evaluate(select, context_node, context_position, context_size)?;
    let content = result.to_string();
    if !content.is_empty() {
        builder.text(&content);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_literal_element<'a>(
    executor: &mut TemplateExecutor<'a>,
    name: &QName,
    namespaces: &[(Option<String>, String)],
    attrs: &[(QName, AttributeValueTemplate)],
    body: &'a PreparsedTemplate,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    builder.start_element(name.clone());
    for (prefix, uri) in namespaces {
        builder.declare_namespace(prefix.as_deref(), uri);
    }
    for (attr_name, avt) in attrs {
        let value = executor.evaluate_avt(avt, context_node, context_position, context_size)?;
        builder.attribute(attr_name.clone(), &value);
    }
    executor.execute_template(body, context_node, context_position, context_size, builder)?;
    builder.end_element();
    Ok(())
}

/// Turns a computed `prefix:local` name into a `QName`. With no `namespace` attribute the
/// prefix is looked up in the instruction's scope, where the key `""` holds the default
/// namespace (consulted for elements only).
fn computed_name(
    lexical: &str,
    namespace: Option<String>,
    scope: &NamespaceMap,
    is_element: bool,
) -> Result<QName, String> {
    let lexical = lexical.trim();
    let (prefix, local) = match lexical.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, lexical),
    };
    if local.is_empty() || local.contains(':') || prefix.is_some_and(str::is_empty) {
        return Err(format!("'{}' is not a valid name", lexical));
    }
    if !is_element && prefix.is_none() && local == "xmlns" {
        return Err("'xmlns' is not a valid attribute name".to_string());
    }

    let namespace = match namespace {
        Some(uri) => Some(uri),
        None => match prefix {
            Some(prefix) => Some(
                scope
                    .get(prefix)
                    .cloned()
                    .ok_or_else(|| format!("namespace prefix '{}' is not declared", prefix))?,
            ),
            None if is_element => scope.get("").cloned(),
            None => None,
        },
    };
    let prefix = prefix.filter(|_| namespace.as_deref().is_some_and(|ns| !ns.is_empty()));
    Ok(QName::namespaced(prefix, local, namespace.as_deref()))
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_element<'a>(
    executor: &mut TemplateExecutor<'a>,
    name_avt: &AttributeValueTemplate,
    namespace_avt: Option<&AttributeValueTemplate>,
    scope: &NamespaceMap,
    body: &'a PreparsedTemplate,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let lexical = executor.evaluate_avt(name_avt, context_node, context_position, context_size)?;
    let namespace = namespace_avt
        .map(|avt| executor.evaluate_avt(avt, context_node, context_position, context_size))
        .transpose()?;

    match computed_name(&lexical, namespace, scope, true) {
        Ok(name) => {
            builder.start_element(name);
            executor.execute_template(body, context_node, context_position, context_size, builder)?;
            builder.end_element();
        }
        Err(reason) => {
            // Recover by instantiating the content without an element around it.
            log::warn!("xsl:element: {}; emitting its content only", reason);
            executor.execute_template(body, context_node, context_position, context_size, builder)?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_attribute<'a>(
    executor: &mut TemplateExecutor<'a>,
    name_avt: &AttributeValueTemplate,
    namespace_avt: Option<&AttributeValueTemplate>,
    scope: &NamespaceMap,
    body: &'a PreparsedTemplate,
    context_node: &Node,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let lexical = executor.evaluate_avt(name_avt, context_node, context_position, context_size)?;
    let namespace = namespace_avt
        .map(|avt| executor.evaluate_avt(avt, context_node, context_position, context_size))
        .transpose()?;
    let value = executor.collect_text(body, context_node, context_position, context_size)?;

    match computed_name(&lexical, namespace, scope, false) {
        Ok(name) => {
            if !builder.attribute(name, &value) {
                log::warn!(
                    "xsl:attribute '{}' ignored: it must come before any child of its element",
                    lexical
                );
            }
        }
        Err(reason) => log::warn!("xsl:attribute ignored: {}", reason),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::computed_name;
    use xdjango_xpath1::NamespaceMap;

    fn scope() -> NamespaceMap {
        NamespaceMap::from([
            ("".to_string(), "urn:default".to_string()),
            ("x".to_string(), "urn:x".to_string()),
        ])
    }

    #[test]
    fn test_element_name_uses_default_namespace() {
        let name = computed_name("item", None, &scope(), true).unwrap();
        assert_eq!(name.namespace.as_deref(), Some("urn:default"));
        assert_eq!(name.prefix, None);
    }

    #[test]
    fn test_attribute_name_ignores_default_namespace() {
        let name = computed_name("id", None, &scope(), false).unwrap();
        assert_eq!(name.namespace, None);
    }

    #[test]
    fn test_prefixed_name_resolves_in_scope() {
        let name = computed_name("x:item", None, &scope(), true).unwrap();
        assert_eq!(name.qualified(), "x:item");
        assert_eq!(name.namespace.as_deref(), Some("urn:x"));
    }

    #[test]
    fn test_namespace_attribute_overrides_scope() {
        let name = computed_name("item", Some("urn:other".to_string()), &scope(), true).unwrap();
        assert_eq!(name.namespace.as_deref(), Some("urn:other"));
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        assert!(computed_name("y:item", None, &scope(), true).is_err());
        assert!(computed_name("", None, &scope(), true).is_err());
        assert!(computed_name("xmlns", None, &scope(), false).is_err());
    }
}
