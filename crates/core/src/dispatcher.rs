//! The runtime side of an `xdjango:` call.
//!
//! `xdjango:greet()` returns the context value `greet` as a string,
//! `xdjango:greet.upper()` resolves the dotted path first, and `xdjango:body('parse')`
//! hands the value to the `parse` renderer. A call never fails the transformation: a
//! missing value becomes `""` and any other failure becomes an inline `<error>` element.

use crate::context::{ContextValue, TemplateContext};
use crate::error::{RenderError, ResolveError};
use crate::renderer::{RendererTable, text_element};
use std::sync::Arc;
use xdjango_xpath1::XPathValue;

/// The dispatcher registered for one context name.
#[derive(Debug)]
pub struct ContextFunction {
    name: String,
    renderers: Arc<RendererTable>,
}

impl ContextFunction {
    pub fn new(name: impl Into<String>, renderers: Arc<RendererTable>) -> Self {
        Self {
            name: name.into(),
            renderers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates a call. `path` is the called name: the registered name itself or a dotted
    /// path below it, such as `greet.upper`.
    pub fn dispatch(&self, context: &TemplateContext, path: &str, args: Vec<XPathValue>) -> XPathValue {
        log::debug!(target: "xdjango::dispatcher", "{}({} args)", path, args.len());

        let value = match context.resolve(path) {
            Ok(value) => value,
            Err(ResolveError::Missing { .. }) => {
                log::error!(target: "xdjango::dispatcher", "{}: no such value in the template context", path);
                return XPathValue::String(String::new());
            }
            Err(e) => {
                return self.failure(path, "Resolve", &e.to_string());
            }
        };

        if let ContextValue::Object(object) = &value
            && let Some(rendered) = object.render_xml(&args)
        {
            return rendered.unwrap_or_else(|e| self.failure(path, e.kind(), &e.to_string()));
        }

        let mut args = args.into_iter().map(|arg| arg.to_string());
        let Some(key) = args.next() else {
            return match value {
                ContextValue::Str(s) | ContextValue::Text(s) => XPathValue::String(s),
                other => XPathValue::String(other.to_string()),
            };
        };
        let rest: Vec<String> = args.collect();

        match self.renderers.render(&key, &value, &rest) {
            Ok(result) => result,
            Err(RenderError::UnknownRenderer(key)) => {
                log::error!(target: "xdjango::dispatcher", "{}: unknown renderer '{}'", path, key);
                error_element(&format!("unknown renderer {} in call to {}", key, path))
            }
            Err(e) => {
                log::error!(target: "xdjango::dispatcher", "{}: renderer {} failed: {}", path, key, e);
                error_element(&format!("renderer {} had error {}", key, e))
            }
        }
    }

    /// Resolves `path` without rendering it, the `pass` renderer. A missing value is
    /// logged and comes back as [`ContextValue::Null`].
    pub fn pass(context: &TemplateContext, path: &str) -> Result<ContextValue, ResolveError> {
        match context.resolve(path) {
            Ok(value) => Ok(value),
            Err(ResolveError::Missing { .. }) => {
                log::error!(target: "xdjango::dispatcher", "{}: no such value in the template context", path);
                Ok(ContextValue::Null)
            }
            Err(e) => Err(e),
        }
    }

    fn failure(&self, path: &str, kind: &str, message: &str) -> XPathValue {
        log::error!(
            target: "xdjango::dispatcher",
            "resolving context call {} ({}) had error {} {}",
            path,
            self.name,
            kind,
            message
        );
        error_element(&format!("resolving context call {} had error {} {}", path, kind, message))
    }
}

/// An `<error>` element carrying `message`, returned in place of a failed call.
pub fn error_element(message: &str) -> XPathValue {
    XPathValue::NodeSet(vec![text_element("error", message)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextObject;
    use crate::renderer::Renderer;
    use serde_json::json;
    use xdjango_xpath1::{SerializeOptions, serialize_node};

    fn markup(value: &XPathValue) -> String {
        match value {
            XPathValue::NodeSet(nodes) => nodes
                .iter()
                .map(|n| serialize_node(n, &SerializeOptions::fragment()).unwrap())
                .collect(),
            other => other.to_string(),
        }
    }

    fn context() -> TemplateContext {
        TemplateContext::from_json(json!({
            "testfunc": "a value",
            "snow": "\u{2603}\u{2603}\u{2603}",
            "count": 3,
            "title": "hello world",
        }))
        .unwrap()
    }

    fn function(name: &str) -> ContextFunction {
        ContextFunction::new(name, Arc::new(RendererTable::new()))
    }

    #[derive(Debug)]
    struct Badge;

    impl ContextObject for Badge {
        fn type_name(&self) -> String {
            "Badge".to_string()
        }

        fn render_xml(&self, args: &[XPathValue]) -> Option<Result<XPathValue, RenderError>> {
            Some(Ok(XPathValue::String(format!("badge:{}", args.len()))))
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl ContextObject for Broken {
        fn type_name(&self) -> String {
            "Broken".to_string()
        }

        fn render_xml(&self, _args: &[XPathValue]) -> Option<Result<XPathValue, RenderError>> {
            Some(Err(RenderError::Failed("database went away".to_string())))
        }
    }

    #[test]
    fn test_zero_argument_call_returns_the_string() {
        let ctx = context();
        let out = function("testfunc").dispatch(&ctx, "testfunc", vec![]);
        assert_eq!(out, XPathValue::String("a value".to_string()));
        let snow = function("snow").dispatch(&ctx, "snow", vec![]);
        assert_eq!(snow.to_string(), "\u{2603}\u{2603}\u{2603}");
        let count = function("count").dispatch(&ctx, "count", vec![]);
        assert_eq!(count, XPathValue::String("3".to_string()));
    }

    #[test]
    fn test_missing_value_is_empty_string() {
        let out = function("absent").dispatch(&context(), "absent", vec![]);
        assert_eq!(out, XPathValue::String(String::new()));
    }

    #[test]
    fn test_dotted_call_applies_method() {
        let out = function("title").dispatch(&context(), "title.upper", vec![]);
        assert_eq!(out.to_string(), "HELLO WORLD");
    }

    #[test]
    fn test_renderer_selected_by_first_argument() {
        let ctx = context();
        let f = function("title");
        let div = f.dispatch(&ctx, "title", vec!["xml".into()]);
        assert_eq!(markup(&div), "<div>hello world</div>");
        let h1 = f.dispatch(&ctx, "title", vec!["xml".into(), "x".into(), "h1".into()]);
        assert_eq!(markup(&h1), "<h1>hello world</h1>");
    }

    #[test]
    fn test_unknown_renderer_is_inline_error() {
        let out = function("title").dispatch(&context(), "title", vec!["shout".into()]);
        assert_eq!(markup(&out), "<error>unknown renderer shout in call to title</error>");
    }

    #[test]
    fn test_renderer_failure_names_the_renderer() {
        let mut table = RendererTable::new();
        table.insert(
            "fails",
            Renderer::direct(|_, _| Err(RenderError::Failed("boom".to_string()))),
        );
        let f = ContextFunction::new("title", Arc::new(table));
        let out = f.dispatch(&context(), "title", vec!["fails".into()]);
        assert_eq!(markup(&out), "<error>renderer fails had error boom</error>");
    }

    #[test]
    fn test_self_rendering_value_takes_precedence() {
        let mut ctx = context();
        ctx.insert("badge", ContextValue::object(Badge));
        let out = function("badge").dispatch(&ctx, "badge", vec!["xml".into(), "x".into()]);
        assert_eq!(out.to_string(), "badge:2");
    }

    #[test]
    fn test_self_rendering_failure_is_contained() {
        let mut ctx = context();
        ctx.insert("broken", ContextValue::object(Broken));
        let out = function("broken").dispatch(&ctx, "broken", vec![]);
        assert_eq!(
            markup(&out),
            "<error>resolving context call broken had error Failed database went away</error>"
        );
    }

    #[test]
    fn test_node_set_arguments_are_reduced_to_strings() {
        let root = xdjango_xpath1::parse_document("<r><t>span</t></r>").unwrap();
        let tag = root.document_element().unwrap().children()[0].clone();
        let out = function("title").dispatch(
            &context(),
            "title",
            vec!["xml".into(), "x".into(), XPathValue::NodeSet(vec![tag])],
        );
        assert_eq!(markup(&out), "<span>hello world</span>");
    }

    #[test]
    fn test_pass_returns_raw_values() {
        let ctx = TemplateContext::from_json(json!({"page": {"rows": [1, 2]}})).unwrap();
        let rows = ContextFunction::pass(&ctx, "page.rows").unwrap();
        assert!(matches!(rows, ContextValue::List(ref items) if items.len() == 2));
        assert!(ContextFunction::pass(&ctx, "page.none").unwrap().is_null());
    }
}
