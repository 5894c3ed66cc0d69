//! Compiling stylesheets against a context-function registry and running them.
//!
//! A [`TransformerBuilder`] collects the renderer table, the resource provider imports
//! are loaded from, and any hooks. [`TransformerBuilder::build`] scans the stylesheet and
//! everything it imports so that every `xdjango:` function exists before the compiler
//! checks calls against the namespace. The resulting [`Transformer`] is immutable and may
//! be shared between threads; each [`Transformer::execute`] brings its own context.

use crate::XDJANGO_NAMESPACE;
use crate::binding::ContextBinding;
use crate::context::TemplateContext;
use crate::error::TransformError;
use crate::registry::ContextFunctionRegistry;
use crate::renderer::{RendererCatalog, RendererTable};
use crate::scanner::ScanningResolver;
use crate::config::Settings;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use xdjango_resource::FilesystemResourceProvider;
use xdjango_traits::{InMemoryResourceProvider, ResourceProvider};
use xdjango_xpath1::{DocumentBuilder, Node, QName, SerializeOptions, parse_document, serialize_node};
use xdjango_xslt::{Extensions, ResourceResolver, XsltParser, XsltTemplate};

/// Application code that runs around compilation and execution.
///
/// `on_init` sees the registry before the stylesheet is scanned, so it can register
/// functions the scanner cannot find. `on_call` runs at the start of every execution
/// and may adjust its context and parameters.
pub trait TransformerHook: Send + Sync {
    fn on_init(&self, _registry: &ContextFunctionRegistry) {}

    fn on_call(&self, _context: &mut TemplateContext, _params: &mut HashMap<String, String>) {}
}

/// The document a transformation runs against.
#[derive(Debug, Clone, Copy, Default)]
pub enum Input<'i> {
    /// A synthetic `<empty/>` document.
    #[default]
    Empty,
    Document(&'i Node),
    /// XML text, parsed before the transformation starts.
    Text(&'i str),
}

impl<'i> From<&'i Node> for Input<'i> {
    fn from(node: &'i Node) -> Self {
        Input::Document(node)
    }
}

impl<'i> From<&'i str> for Input<'i> {
    fn from(text: &'i str) -> Self {
        Input::Text(text)
    }
}

impl<'i> From<&'i String> for Input<'i> {
    fn from(text: &'i String) -> Self {
        Input::Text(text)
    }
}

pub struct TransformerBuilder {
    renderers: RendererTable,
    resource_provider: Option<Arc<dyn ResourceProvider>>,
    base_uri: Option<String>,
    verbose: bool,
    init_hooks: Vec<Arc<dyn TransformerHook>>,
    percall_hooks: Vec<Arc<dyn TransformerHook>>,
}

impl Default for TransformerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformerBuilder {
    pub fn new() -> Self {
        Self {
            renderers: RendererTable::new(),
            resource_provider: None,
            base_uri: None,
            verbose: false,
            init_hooks: Vec::new(),
            percall_hooks: Vec::new(),
        }
    }

    /// A builder configured from `settings`: stylesheets load from the transforms
    /// directory and configured renderers resolve through `catalog`.
    pub fn from_settings(settings: &Settings, catalog: Arc<RendererCatalog>) -> Self {
        Self::new()
            .with_renderers(RendererTable::from_paths(&settings.renderers, catalog))
            .with_resource_provider(Arc::new(FilesystemResourceProvider::new(&settings.transforms)))
            .with_verbose(settings.debug)
    }

    pub fn with_renderers(mut self, renderers: RendererTable) -> Self {
        self.renderers = renderers;
        self
    }

    /// Where `xsl:import` and `xsl:include` hrefs are loaded from.
    pub fn with_resource_provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.resource_provider = Some(provider);
        self
    }

    /// The stylesheet's own location within the resource provider. Relative hrefs in
    /// the stylesheet resolve against it.
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    /// Verbose transformers render failures as error pages and list parse errors from
    /// the `parse` renderers. Overrides the flag of the renderer table.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Adds a hook run before scanning. Returns false if this hook is already present.
    pub fn add_init_hook(&mut self, hook: Arc<dyn TransformerHook>) -> bool {
        add_hook(&mut self.init_hooks, hook)
    }

    /// Adds a hook run at the start of every execution. Returns false if this hook is
    /// already present.
    pub fn add_percall_hook(&mut self, hook: Arc<dyn TransformerHook>) -> bool {
        add_hook(&mut self.percall_hooks, hook)
    }

    /// Scans and compiles `source`.
    pub fn build(self, source: &str) -> Result<Transformer, TransformError> {
        let renderers = Arc::new(self.renderers.with_verbose(self.verbose));
        let registry = Arc::new(ContextFunctionRegistry::new(renderers));
        for hook in &self.init_hooks {
            hook.on_init(&registry);
        }

        let provider = self
            .resource_provider
            .unwrap_or_else(|| Arc::new(InMemoryResourceProvider::new()));
        let scanner = Arc::new(ScanningResolver::new(
            Arc::new(ResourceResolver::new(provider)),
            Arc::clone(&registry),
        ));
        scanner.scan(self.base_uri.as_deref().unwrap_or_default(), source)?;

        let mut parser = XsltParser::new().with_resolver(scanner);
        parser.register_function_namespace(XDJANGO_NAMESPACE, registry.clone());
        let template = parser.parse(source, self.base_uri.as_deref())?;

        log::debug!(
            target: "xdjango::transformer",
            "Compiled {} with {} context functions",
            self.base_uri.as_deref().unwrap_or("stylesheet"),
            registry.len()
        );
        Ok(Transformer {
            template,
            registry,
            percall_hooks: self.percall_hooks,
            verbose: self.verbose,
        })
    }
}

fn add_hook(hooks: &mut Vec<Arc<dyn TransformerHook>>, hook: Arc<dyn TransformerHook>) -> bool {
    if hooks.iter().any(|h| Arc::ptr_eq(h, &hook)) {
        return false;
    }
    hooks.push(hook);
    true
}

/// A compiled stylesheet bound to its context-function registry.
pub struct Transformer {
    template: XsltTemplate,
    registry: Arc<ContextFunctionRegistry>,
    percall_hooks: Vec<Arc<dyn TransformerHook>>,
    verbose: bool,
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("functions", &self.registry.names())
            .field("percall_hooks", &self.percall_hooks.len())
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl Transformer {
    /// Compiles a self-contained stylesheet with the built-in renderers.
    pub fn compile(source: &str) -> Result<Self, TransformError> {
        TransformerBuilder::new().build(source)
    }

    pub fn builder() -> TransformerBuilder {
        TransformerBuilder::new()
    }

    pub fn registry(&self) -> &ContextFunctionRegistry {
        &self.registry
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Runs the stylesheet with `context` bound for the duration of the call.
    ///
    /// In verbose mode a failure is rendered as an HTML error page instead of being
    /// returned.
    pub fn execute<'i>(
        &self,
        input: impl Into<Input<'i>>,
        context: TemplateContext,
        params: &HashMap<String, String>,
    ) -> Result<String, TransformError> {
        match self.try_execute(input.into(), context, params) {
            Ok(output) => Ok(output),
            Err(e) => {
                log::error!(target: "xdjango::transformer", "Transformation failed: {}", e);
                if self.verbose {
                    error_document(&e)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// [`Transformer::execute`] against the `<empty/>` document without parameters.
    pub fn render(&self, context: TemplateContext) -> Result<String, TransformError> {
        self.execute(Input::Empty, context, &HashMap::new())
    }

    fn try_execute(
        &self,
        input: Input<'_>,
        mut context: TemplateContext,
        params: &HashMap<String, String>,
    ) -> Result<String, TransformError> {
        let mut params = params.clone();
        for hook in &self.percall_hooks {
            hook.on_call(&mut context, &mut params);
        }

        let parsed;
        let document = match input {
            Input::Document(node) => node,
            Input::Empty => {
                parsed = parse_document("<empty/>").map_err(TransformError::Input)?;
                &parsed
            }
            Input::Text(text) => {
                parsed = parse_document(text).map_err(TransformError::Input)?;
                &parsed
            }
        };

        let binding = ContextBinding::new(&self.registry, context);
        let extensions = Extensions::none()
            .with_functions(&binding)
            .with_elements(&binding);
        let result = self.template.execute(document, &params, extensions)?;
        self.template
            .serialize(&result)
            .map_err(|e| TransformError::Output(e.to_string()))
    }
}

/// `<html><h1>an error occurred</h1><ol><li>...</li></ol></html>`, one item for the
/// error and one for each error that caused it.
fn error_document(error: &TransformError) -> Result<String, TransformError> {
    let mut builder = DocumentBuilder::new();
    builder.start_element(QName::local("html"));
    builder.start_element(QName::local("h1"));
    builder.text("an error occurred");
    builder.end_element();
    builder.start_element(QName::local("ol"));
    let mut current: Option<&dyn StdError> = Some(error);
    while let Some(e) = current {
        builder.start_element(QName::local("li"));
        builder.text(&e.to_string());
        builder.end_element();
        current = e.source();
    }
    builder.end_element();
    builder.end_element();
    serialize_node(&builder.finish(), &SerializeOptions::fragment())
        .map_err(|e| TransformError::Output(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextValue;
    use crate::query::{QuerySource, RenderableQuery};
    use crate::error::SerializeError;
    use crate::serializer::{FieldMap, Record};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sheet(body: &str) -> String {
        format!(
            r#"<xsl:stylesheet version="1.0"
                xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
                xmlns:xdjango="http://djangoproject.com/template/xslt"
                extension-element-prefixes="xdjango"
                exclude-result-prefixes="xdjango">
                <xsl:output method="xml" omit-xml-declaration="yes"/>
                {}
            </xsl:stylesheet>"#,
            body
        )
    }

    fn context(value: serde_json::Value) -> TemplateContext {
        TemplateContext::from_json(value).unwrap()
    }

    fn render(body: &str, value: serde_json::Value) -> String {
        let _ = env_logger::builder().is_test(true).try_init();
        Transformer::compile(&sheet(body))
            .unwrap()
            .render(context(value))
            .unwrap()
    }

    #[test]
    fn test_value_of_context_function() {
        let out = render(
            r#"<xsl:template match="/"><xsl:value-of select="xdjango:greet()"/></xsl:template>"#,
            json!({"greet": "hello world"}),
        );
        assert_eq!(out, "hello world\n");
    }

    #[test]
    fn test_dotted_call_applies_method() {
        let out = render(
            r#"<xsl:template match="/"><xsl:value-of select="xdjango:greet.upper()"/></xsl:template>"#,
            json!({"greet": "hello world"}),
        );
        assert_eq!(out, "HELLO WORLD\n");
    }

    #[test]
    fn test_attribute_value_templates() {
        let out = render(
            r#"<xsl:template match="/">
                 <a href="{xdjango:root()}/x" title="/{xdjango:name()}/y" alt="{xdjango:root()}-{xdjango:name()}"/>
               </xsl:template>"#,
            json!({"root": "base", "name": "page"}),
        );
        assert_eq!(out, "<a href=\"base/x\" title=\"/page/y\" alt=\"base-page\"/>\n");
    }

    #[test]
    fn test_missing_value_renders_empty() {
        let out = render(
            r#"<xsl:template match="/"><p><xsl:value-of select="xdjango:absent()"/></p></xsl:template>"#,
            json!({}),
        );
        assert_eq!(out, "<p/>\n");
    }

    #[test]
    fn test_renderer_output_is_copied() {
        let out = render(
            r#"<xsl:template match="/"><xsl:copy-of select="xdjango:title('xml', 'x', 'h1')"/></xsl:template>"#,
            json!({"title": "Welcome"}),
        );
        assert_eq!(out, "<h1>Welcome</h1>\n");
    }

    #[test]
    fn test_verbose_builder_lists_parse_errors() {
        let body = r#"<xsl:template match="/"><r><xsl:copy-of select="xdjango:body('parse')"/></r></xsl:template>"#;
        let ctx = || context(json!({"body": "<a><b></a>"}));

        let quiet = TransformerBuilder::new().build(&sheet(body)).unwrap();
        assert_eq!(quiet.render(ctx()).unwrap(), "<r/>\n");

        let verbose = TransformerBuilder::new().with_verbose(true).build(&sheet(body)).unwrap();
        let out = verbose.render(ctx()).unwrap();
        assert!(out.starts_with("<r><ol><li>"), "{}", out);
    }

    #[test]
    fn test_queryset_applies_templates_per_row() {
        let out = render(
            r#"<xsl:template match="/"><ul><xdjango:queryset key="posts" dest="post"/></ul></xsl:template>
               <xsl:template match="xdjango:post"><li><xsl:value-of select="xdjango:post.title()"/></li></xsl:template>"#,
            json!({"posts": [{"title": "first"}, {"title": "second"}]}),
        );
        assert_eq!(out, "<ul><li>first</li><li>second</li></ul>\n");
    }

    #[test]
    fn test_queryset_runs_its_content() {
        let out = render(
            r#"<xsl:template match="/"><ul><xdjango:queryset key="page.tags" dest="tag"><li><xsl:value-of select="xdjango:tag.upper()"/></li></xdjango:queryset></ul></xsl:template>"#,
            json!({"page": {"tags": ["a", "b"]}}),
        );
        assert_eq!(out, "<ul><li>A</li><li>B</li></ul>\n");
    }

    #[test]
    fn test_queryset_unbinds_dest() {
        let out = render(
            r#"<xsl:template match="/"><r><xdjango:queryset key="rows" dest="row"><xsl:value-of select="xdjango:row()"/></xdjango:queryset>|<xsl:value-of select="xdjango:row()"/></r></xsl:template>"#,
            json!({"rows": [1, 2, 3], "row": "outer"}),
        );
        assert_eq!(out, "<r>123|outer</r>\n");
    }

    #[test]
    fn test_queryset_missing_key_emits_nothing() {
        let out = render(
            r#"<xsl:template match="/"><ul><xdjango:queryset key="nothing" dest="row"><li/></xdjango:queryset></ul></xsl:template>"#,
            json!({}),
        );
        assert_eq!(out, "<ul/>\n");
    }

    #[test]
    fn test_queryset_requires_dest() {
        let transformer = Transformer::compile(&sheet(
            r#"<xsl:template match="/"><xdjango:queryset key="rows"/></xsl:template>"#,
        ))
        .unwrap();
        let err = transformer.render(context(json!({"rows": [1]}))).unwrap_err();
        assert!(matches!(err, TransformError::Execution(_)));
    }

    #[test]
    fn test_input_text_is_parsed() {
        let transformer = Transformer::compile(&sheet(
            r#"<xsl:template match="/"><out><xsl:value-of select="/doc/@n"/>:<xsl:value-of select="xdjango:x()"/></out></xsl:template>"#,
        ))
        .unwrap();
        let out = transformer
            .execute(r#"<doc n="7"/>"#, context(json!({"x": "y"})), &HashMap::new())
            .unwrap();
        assert_eq!(out, "<out>7:y</out>\n");
    }

    #[test]
    fn test_bad_input_is_an_error_unless_verbose() {
        let body = r#"<xsl:template match="/"><out/></xsl:template>"#;
        let quiet = Transformer::compile(&sheet(body)).unwrap();
        let err = quiet
            .execute("<doc>", TemplateContext::new(), &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, TransformError::Input(_)));

        let verbose = TransformerBuilder::new().with_verbose(true).build(&sheet(body)).unwrap();
        let page = verbose
            .execute("<doc>", TemplateContext::new(), &HashMap::new())
            .unwrap();
        assert!(page.starts_with("<html><h1>an error occurred</h1><ol><li>input document could not be parsed"));
        assert!(page.ends_with("</li></ol></html>"));
    }

    #[test]
    fn test_params_are_passed() {
        let transformer = Transformer::compile(&sheet(
            r#"<xsl:param name="who" select="'nobody'"/>
               <xsl:template match="/"><p><xsl:value-of select="$who"/></p></xsl:template>"#,
        ))
        .unwrap();
        let params = HashMap::from([("who".to_string(), "everyone".to_string())]);
        let out = transformer.execute(Input::Empty, TemplateContext::new(), &params).unwrap();
        assert_eq!(out, "<p>everyone</p>\n");
    }

    #[test]
    fn test_imports_are_scanned() {
        let provider = Arc::new(InMemoryResourceProvider::new());
        provider
            .add_text(
                "lib/common.xslt",
                &sheet(r#"<xsl:template name="footer"><footer><xsl:value-of select="xdjango:site.upper()"/></footer></xsl:template>"#),
            )
            .unwrap();
        let source = sheet(
            r#"<xsl:import href="lib/common.xslt"/>
               <xsl:template match="/"><page><xsl:call-template name="footer"/></page></xsl:template>"#,
        );
        let transformer = TransformerBuilder::new()
            .with_resource_provider(provider)
            .with_base_uri("page.xslt")
            .build(&source)
            .unwrap();
        assert!(transformer.registry().contains("site"));
        let out = transformer.render(context(json!({"site": "example"}))).unwrap();
        assert_eq!(out, "<page><footer>EXAMPLE</footer></page>\n");
    }

    #[test]
    fn test_unresolvable_import_is_fatal() {
        let source = sheet(r#"<xsl:import href="missing.xslt"/>"#);
        let err = TransformerBuilder::new().build(&source).unwrap_err();
        assert!(matches!(err, TransformError::Compile(_)));
    }

    struct Stamp {
        calls: AtomicUsize,
    }

    impl TransformerHook for Stamp {
        fn on_init(&self, registry: &ContextFunctionRegistry) {
            registry.register("clock");
        }

        fn on_call(&self, context: &mut TemplateContext, params: &mut HashMap<String, String>) {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            context.insert("stamp", ContextValue::Int(n as i64));
            params.insert("mode".to_string(), "hooked".to_string());
        }
    }

    #[test]
    fn test_hooks_run_once_each() {
        let hook = Arc::new(Stamp {
            calls: AtomicUsize::new(0),
        });
        let mut builder = TransformerBuilder::new();
        assert!(builder.add_init_hook(hook.clone()));
        assert!(!builder.add_init_hook(hook.clone()));
        assert!(builder.add_percall_hook(hook.clone()));
        assert!(!builder.add_percall_hook(hook.clone()));

        let source = sheet(
            r#"<xsl:param name="mode"/>
               <xsl:template match="/"><p><xsl:value-of select="$mode"/>:<xsl:value-of select="xdjango:stamp()"/></p></xsl:template>"#,
        );
        let transformer = builder.build(&source).unwrap();
        assert!(transformer.registry().contains("clock"));
        assert_eq!(transformer.render(TemplateContext::new()).unwrap(), "<p>hooked:1</p>\n");
        assert_eq!(transformer.render(TemplateContext::new()).unwrap(), "<p>hooked:2</p>\n");
        assert_eq!(hook.calls.load(Ordering::SeqCst), 2);
    }

    #[derive(Debug, Clone)]
    struct Users {
        rows: Arc<Vec<(i64, &'static str)>>,
        limit: usize,
    }

    impl QuerySource for Users {
        fn model_name(&self) -> String {
            "User".to_string()
        }

        fn values(&self, fields: &[String]) -> Result<Vec<Record>, SerializeError> {
            Ok(self
                .rows
                .iter()
                .take(self.limit)
                .map(|(id, name)| {
                    fields
                        .iter()
                        .filter_map(|f| match f.as_str() {
                            "id" => Some((f.clone(), ContextValue::Int(*id))),
                            "name" => Some((f.clone(), ContextValue::from(*name))),
                            _ => None,
                        })
                        .collect()
                })
                .collect())
        }

        fn objects(&self) -> Result<Box<dyn Iterator<Item = ContextValue> + '_>, SerializeError> {
            Ok(Box::new(self.rows.iter().take(self.limit).map(|(id, name)| {
                ContextValue::Map(
                    [
                        ("id".to_string(), ContextValue::Int(*id)),
                        ("name".to_string(), ContextValue::from(*name)),
                    ]
                    .into(),
                )
            })))
        }
    }

    #[test]
    fn test_serialized_query_is_copied_into_output() {
        let users = Users {
            rows: Arc::new(vec![(1, "ann"), (2, "bob")]),
            limit: usize::MAX,
        };
        let query = RenderableQuery::new(users).xml(FieldMap::new().field("name", "name"));
        let mut ctx = TemplateContext::new();
        ctx.insert("users", ContextValue::object(query));
        let transformer = Transformer::compile(&sheet(
            r#"<xsl:template match="/"><xsl:copy-of select="xdjango:users()"/></xsl:template>"#,
        ))
        .unwrap();
        assert_eq!(
            transformer.render(ctx).unwrap(),
            "<users><user name=\"ann\"/><user name=\"bob\"/></users>\n"
        );
    }
}
