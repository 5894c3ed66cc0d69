//! Assertions over rendered output, for tests of stylesheets and renderers.

use std::collections::HashMap;
use xdjango_xpath1::{
    EvaluationContext, FunctionRegistry, NamespaceMap, XPathError, XPathValue, evaluate,
    parse_document, parse_expression,
};

/// Evaluates `xpath` against the XML text `xml` with the given prefix bindings.
pub fn xpath_matches(xml: &str, xpath: &str, namespaces: &[(&str, &str)]) -> Result<XPathValue, XPathError> {
    let root = parse_document(xml)?;
    let expression = parse_expression(xpath)?;
    let functions = FunctionRegistry::default();
    let variables = HashMap::new();
    let namespaces: NamespaceMap = namespaces
        .iter()
        .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
        .collect();
    let e_ctx = EvaluationContext::new(&root, &root, &functions, 1, 1, &variables, None, false)
        .with_namespaces(&namespaces);
    evaluate(&expression, &e_ctx)
}

/// Panics unless `xpath` selects something in `xml`: a non-empty node-set, or any other
/// value that is true as a boolean.
pub fn assert_xpath(xml: &str, xpath: &str, namespaces: &[(&str, &str)]) {
    match xpath_matches(xml, xpath, namespaces) {
        Ok(value) if value.to_bool() => {}
        Ok(value) => panic!("{} evaluated to {:?} in\n{}", xpath, value, xml),
        Err(e) => panic!("{} could not be evaluated: {}\n{}", xpath, e, xml),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::XHTML_NAMESPACE;

    #[test]
    fn test_assert_xpath_with_namespaces() {
        let xml = format!(r#"<html xmlns="{}"><body><p class="x">hi</p></body></html>"#, XHTML_NAMESPACE);
        assert_xpath(&xml, "/h:html/h:body/h:p[@class='x']", &[("h", XHTML_NAMESPACE)]);
        assert_xpath(&xml, "string(//h:p) = 'hi'", &[("h", XHTML_NAMESPACE)]);
    }

    #[test]
    #[should_panic]
    fn test_assert_xpath_fails_on_no_match() {
        assert_xpath("<a><b/></a>", "/a/c", &[]);
    }

    #[test]
    fn test_xpath_matches_reports_bad_input() {
        assert!(xpath_matches("<a>", "/a", &[]).is_err());
        assert!(xpath_matches("<a/>", "/a[", &[]).is_err());
    }
}
