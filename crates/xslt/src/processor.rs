//! The public entry points: [`XsltParser`] compiles a stylesheet together with everything
//! it imports or includes, and [`XsltTemplate`] runs the result against input documents.

use crate::ast::{self, CompiledStylesheet};
use crate::compiler;
use crate::error::XsltError;
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::extension::{Extensions, FunctionNamespace, FunctionNamespaces};
use crate::resolver::{DocumentResolver, MAX_IMPORT_DEPTH};
use std::collections::HashMap;
use std::sync::Arc;
use xdjango_xpath1::{DocumentBuilder, Node, OutputMethod, SerializeOptions, serialize_document};

/// Compiles XSLT 1.0 stylesheets.
#[derive(Clone, Default)]
pub struct XsltParser {
    function_namespaces: FunctionNamespaces,
    resolvers: Vec<Arc<dyn DocumentResolver>>,
}

impl XsltParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a namespace of extension functions. Calls into it are checked against
    /// [`FunctionNamespace::has_function`] while compiling.
    pub fn register_function_namespace(
        &mut self,
        uri: impl Into<String>,
        namespace: Arc<dyn FunctionNamespace>,
    ) {
        self.function_namespaces.insert(uri.into(), namespace);
    }

    /// Appends a resolver to the chain consulted for `xsl:import` and `xsl:include`.
    pub fn with_resolver(mut self, resolver: Arc<dyn DocumentResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn add_resolver(&mut self, resolver: Arc<dyn DocumentResolver>) {
        self.resolvers.push(resolver);
    }

    /// Compiles `source`, whose own location is `base_uri`, along with its imports and
    /// includes.
    pub fn parse(&self, source: &str, base_uri: Option<&str>) -> Result<XsltTemplate, XsltError> {
        let mut resolving = Vec::new();
        let mut compiled = self.compile_tree(source, base_uri, &mut resolving)?;
        compiled.sort_rules();
        Ok(XsltTemplate {
            compiled: Arc::new(compiled),
        })
    }

    fn compile_tree(
        &self,
        source: &str,
        base_uri: Option<&str>,
        resolving: &mut Vec<String>,
    ) -> Result<CompiledStylesheet, XsltError> {
        let mut stylesheet = compiler::compile_document(source, self.function_namespaces.clone())?;

        for href in std::mem::take(&mut stylesheet.includes) {
            let included = self.load_nested(&href, base_uri, resolving)?;
            stylesheet.merge_included(included);
        }
        for href in std::mem::take(&mut stylesheet.imports) {
            let imported = self.load_nested(&href, base_uri, resolving)?;
            stylesheet.merge_imported(imported);
        }
        Ok(stylesheet)
    }

    fn load_nested(
        &self,
        href: &str,
        base_uri: Option<&str>,
        resolving: &mut Vec<String>,
    ) -> Result<CompiledStylesheet, XsltError> {
        if resolving.len() >= MAX_IMPORT_DEPTH {
            return Err(XsltError::import(
                href,
                format!("Maximum import depth ({}) exceeded", MAX_IMPORT_DEPTH),
            ));
        }

        let document = self.resolve(href, base_uri)?;
        if resolving.contains(&document.uri) || base_uri == Some(document.uri.as_str()) {
            return Err(XsltError::CircularImport(document.uri));
        }

        log::debug!("Compiling '{}' (from '{}')", document.uri, href);
        resolving.push(document.uri.clone());
        let result = self
            .compile_tree(&document.text, Some(&document.uri), resolving)
            .map_err(|e| match e {
                XsltError::CircularImport(_) | XsltError::Import { .. } => e,
                other => XsltError::import(&document.uri, other.to_string()),
            });
        resolving.pop();
        result
    }

    fn resolve(
        &self,
        href: &str,
        base_uri: Option<&str>,
    ) -> Result<crate::resolver::ResolvedDocument, XsltError> {
        for resolver in &self.resolvers {
            if let Some(document) = resolver.resolve(href, base_uri)? {
                return Ok(document);
            }
        }
        Err(XsltError::Unresolved(href.to_string()))
    }
}

/// A compiled stylesheet, cheap to clone and shareable across threads.
#[derive(Debug, Clone)]
pub struct XsltTemplate {
    compiled: Arc<CompiledStylesheet>,
}

impl XsltTemplate {
    pub fn compiled(&self) -> &CompiledStylesheet {
        &self.compiled
    }

    pub fn output(&self) -> &ast::OutputDeclaration {
        &self.compiled.output
    }

    /// Transforms `input` into a new result tree. `params` override the stylesheet's
    /// top-level `xsl:param` defaults and are bound as strings.
    pub fn execute(
        &self,
        input: &Node,
        params: &HashMap<String, String>,
        extensions: Extensions<'_>,
    ) -> Result<Node, ExecutionError> {
        let mut executor = TemplateExecutor::new(&self.compiled, input.clone(), params, extensions)?;
        let mut builder = DocumentBuilder::new();
        executor.execute(&mut builder)?;
        Ok(builder.finish())
    }

    /// Serializes a result tree as `xsl:output` asks. Without a declared method, a result
    /// whose document element is an unqualified `html` is written as HTML, anything else
    /// as XML.
    pub fn serialize(&self, result: &Node) -> Result<String, XsltError> {
        let output = &self.compiled.output;
        let method = output.method.unwrap_or_else(|| detect_output_method(result));
        let options = SerializeOptions {
            method,
            omit_xml_declaration: output.omit_xml_declaration,
            encoding: output.encoding.clone(),
            trailing_newline: true,
        };
        Ok(serialize_document(result, &options)?)
    }

    pub fn transform_to_string(
        &self,
        input: &Node,
        params: &HashMap<String, String>,
        extensions: Extensions<'_>,
    ) -> Result<String, XsltError> {
        let result = self.execute(input, params, extensions)?;
        self.serialize(&result)
    }
}

fn detect_output_method(result: &Node) -> OutputMethod {
    let is_html = result
        .document_element()
        .and_then(|e| e.name().cloned())
        .is_some_and(|name| {
            name.namespace.is_none() && name.local_part.eq_ignore_ascii_case("html")
        });
    if is_html {
        OutputMethod::Html
    } else {
        OutputMethod::Xml
    }
}
