//! XSLT 1.0 compiler that builds a `CompiledStylesheet` from XML events.
//!
//! The builder keeps three parallel stacks, one frame per open element: the namespace
//! scope, the element kind, and the instructions collected for its body. A fourth stack,
//! `state_stack`, carries what each XSLT element needs once its end tag is seen.

use crate::ast::{
    CompiledStylesheet, Param, PreparsedTemplate, SortKey, When, WithParam, XPathExpr,
    XSLT_NAMESPACE, XsltInstruction,
};
use crate::error::XsltError;
use crate::extension::FunctionNamespaces;
use crate::pattern::{self, Pattern};
use crate::util::{OwnedAttributes, get_attr_optional, get_line_col_from_pos};
use std::str::from_utf8;
use std::sync::Arc;
use xdjango_xpath1::{NamespaceMap, QName, XML_NAMESPACE};

/// A trait defining the callbacks the parser driver will use to build a stylesheet.
pub trait StylesheetBuilder {
    fn start_element(
        &mut self,
        name: &[u8],
        attrs: OwnedAttributes,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError>;

    fn empty_element(
        &mut self,
        name: &[u8],
        attrs: OwnedAttributes,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        self.start_element(name, attrs, pos, source)?;
        self.end_element(name, pos, source)
    }

    fn end_element(&mut self, name: &[u8], pos: usize, source: &str) -> Result<(), XsltError>;
    fn text(&mut self, text: String) -> Result<(), XsltError>;
}

/// What an element in the stylesheet turned out to be once its name was resolved.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ElementKind {
    /// An instruction or declaration in the XSLT namespace, by local name.
    Xslt(String),
    /// An element in a namespace listed in `extension-element-prefixes`.
    Extension(QName),
    LiteralResult(QName),
    /// Content that does not contribute to the compiled stylesheet.
    Ignored,
}

/// Represents the current state of the builder, tracking nested structures.
#[derive(Debug)]
pub(crate) enum BuilderState {
    Stylesheet,
    Template {
        attrs: OwnedAttributes,
        params: Vec<Param>,
    },
    InstructionBody(OwnedAttributes),
    XslText,
    Choose {
        whens: Vec<When>,
        otherwise: Option<PreparsedTemplate>,
    },
    When(OwnedAttributes),
    Otherwise,
    Sortable {
        attrs: OwnedAttributes,
        sort_keys: Vec<SortKey>,
        params: Vec<WithParam>,
    },
    CallTemplate {
        name: String,
        params: Vec<WithParam>,
    },
    /// `xsl:variable`, `xsl:param` and `xsl:with-param`, whose content may form the value.
    Binding(OwnedAttributes),
    LiteralResult(OwnedAttributes),
    Extension {
        attrs: OwnedAttributes,
        fallback: Option<PreparsedTemplate>,
    },
    Fallback,
    Ignored,
}

/// The namespace environment of one open element.
#[derive(Debug, Clone, Default)]
struct Scope {
    /// Prefix bindings, `xml` excluded.
    namespaces: Arc<NamespaceMap>,
    default_namespace: Option<String>,
    /// Namespace URIs that literal result elements do not copy to the output.
    excluded: Vec<String>,
    /// Namespace URIs whose elements are extension instructions.
    extension: Vec<String>,
}

pub struct CompilerBuilder {
    pub(crate) stylesheet: CompiledStylesheet,
    pub(crate) instruction_stack: Vec<Vec<XsltInstruction>>,
    pub(crate) state_stack: Vec<BuilderState>,
    element_stack: Vec<ElementKind>,
    scopes: Vec<Scope>,
    function_namespaces: FunctionNamespaces,
    /// Set when the document element is a literal result element (a simplified stylesheet).
    simplified: bool,
}

impl Default for CompilerBuilder {
    fn default() -> Self {
        Self::new(FunctionNamespaces::new())
    }
}

impl CompilerBuilder {
    pub fn new(function_namespaces: FunctionNamespaces) -> Self {
        Self {
            stylesheet: CompiledStylesheet::default(),
            instruction_stack: Vec::new(),
            state_stack: vec![BuilderState::Stylesheet],
            element_stack: Vec::new(),
            scopes: vec![Scope::default()],
            function_namespaces,
            simplified: false,
        }
    }

    pub fn finalize(self) -> Result<CompiledStylesheet, XsltError> {
        if !self.element_stack.is_empty() {
            return Err(XsltError::Compilation(
                "stylesheet ended with unclosed elements".to_string(),
            ));
        }
        Ok(self.stylesheet)
    }

    fn scope(&self) -> &Scope {
        // The stack is seeded with an empty scope and never popped below it.
        &self.scopes[self.scopes.len() - 1]
    }

    /// The prefix bindings in effect at the element being compiled.
    pub(crate) fn namespaces(&self) -> Arc<NamespaceMap> {
        Arc::clone(&self.scope().namespaces)
    }

    /// Like [`Self::namespaces`], with the default namespace recorded under the empty prefix.
    pub(crate) fn namespaces_with_default(&self) -> Arc<NamespaceMap> {
        let scope = self.scope();
        match &scope.default_namespace {
            Some(uri) => {
                let mut map = (*scope.namespaces).clone();
                map.insert(String::new(), uri.clone());
                Arc::new(map)
            }
            None => Arc::clone(&scope.namespaces),
        }
    }

    pub(crate) fn lookup_prefix(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        self.scope().namespaces.get(prefix).cloned()
    }

    /// Resolves a name as written in the stylesheet. Element names pick up the default
    /// namespace, attribute names do not.
    pub(crate) fn resolve_qname(
        &self,
        name: &str,
        is_element: bool,
        pos: usize,
        source: &str,
    ) -> Result<QName, XsltError> {
        match name.split_once(':') {
            Some((prefix, local)) => {
                let uri = self.lookup_prefix(prefix).ok_or_else(|| XsltError::TemplateSyntax {
                    msg: format!("Namespace prefix '{}' of '{}' is not declared", prefix, name),
                    location: get_line_col_from_pos(source, pos).into(),
                })?;
                Ok(QName::namespaced(Some(prefix), local, Some(&uri)))
            }
            None if is_element => Ok(QName::namespaced(
                None,
                name,
                self.scope().default_namespace.as_deref(),
            )),
            None => Ok(QName::local(name)),
        }
    }

    /// Parses an XPath expression, binding it to the namespaces in scope. Prefixed function
    /// calls are checked against the registered function namespaces.
    pub(crate) fn parse_xpath(&self, text: &str) -> Result<XPathExpr, XsltError> {
        let expr = xdjango_xpath1::parse_expression(text)
            .map_err(|e| XsltError::XPathParse(text.to_string(), e.to_string()))?;
        let namespaces = self.namespaces();

        let mut problem = None;
        expr.visit_function_calls(&mut |name: &str| {
            if problem.is_some() {
                return;
            }
            let Some((prefix, local)) = name.split_once(':') else {
                return;
            };
            match namespaces.get(prefix) {
                None => {
                    problem = Some(XsltError::XPathParse(
                        text.to_string(),
                        format!("namespace prefix '{}' is not declared", prefix),
                    ));
                }
                Some(uri) => {
                    if let Some(ns) = self.function_namespaces.get(uri)
                        && !ns.has_function(local)
                    {
                        problem = Some(XsltError::UnknownExtensionFunction {
                            namespace: uri.clone(),
                            name: local.to_string(),
                        });
                    }
                }
            }
        });
        if let Some(e) = problem {
            return Err(e);
        }

        Ok(XPathExpr {
            expr,
            namespaces,
            source: text.to_string(),
        })
    }

    pub(crate) fn parse_pattern(&self, text: &str) -> Result<Pattern, XsltError> {
        pattern::parse(text, self.namespaces())
    }

    pub(crate) fn push_instruction(&mut self, instr: XsltInstruction) {
        if let Some(parent) = self.instruction_stack.last_mut() {
            parent.push(instr);
        }
    }

    /// Splits namespace declarations out of `attrs` and derives the element's scope.
    fn enter_scope(&mut self, attrs: OwnedAttributes) -> Result<OwnedAttributes, XsltError> {
        let mut scope = self.scope().clone();
        let mut declared: Vec<(String, String)> = Vec::new();
        let mut rest = Vec::with_capacity(attrs.len());

        for (key, value) in attrs {
            if key == b"xmlns" {
                let uri = from_utf8(&value)?.to_string();
                scope.default_namespace = (!uri.is_empty()).then_some(uri);
            } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
                declared.push((from_utf8(prefix)?.to_string(), from_utf8(&value)?.to_string()));
            } else {
                rest.push((key, value));
            }
        }

        if !declared.is_empty() {
            let mut map = (*scope.namespaces).clone();
            map.extend(declared);
            scope.namespaces = Arc::new(map);
        }
        self.scopes.push(scope);
        Ok(rest)
    }

    /// Reads `exclude-result-prefixes` / `extension-element-prefixes` style lists into
    /// the current scope.
    fn apply_prefix_lists(
        &mut self,
        excluded: Option<String>,
        extension: Option<String>,
    ) -> Result<(), XsltError> {
        let resolve = |builder: &Self, list: &str| -> Result<Vec<String>, XsltError> {
            let scope = builder.scope();
            let mut uris = Vec::new();
            for token in list.split_whitespace() {
                match token {
                    "#default" => uris.extend(scope.default_namespace.clone()),
                    "#all" => {
                        uris.extend(scope.namespaces.values().cloned());
                        uris.extend(scope.default_namespace.clone());
                    }
                    prefix => {
                        let uri = builder.lookup_prefix(prefix).ok_or_else(|| {
                            XsltError::Compilation(format!(
                                "Namespace prefix '{}' in prefix list is not declared",
                                prefix
                            ))
                        })?;
                        uris.push(uri);
                    }
                }
            }
            Ok(uris)
        };

        let excluded = excluded.map(|l| resolve(self, &l)).transpose()?;
        let extension = extension.map(|l| resolve(self, &l)).transpose()?;
        if let Some(scope) = self.scopes.last_mut() {
            scope.excluded.extend(excluded.unwrap_or_default());
            scope.extension.extend(extension.unwrap_or_default());
        }
        Ok(())
    }

    /// The namespace nodes a literal result element copies to the output.
    pub(crate) fn literal_namespaces(&self) -> Vec<(Option<String>, String)> {
        let scope = self.scope();
        let keep = |uri: &String| {
            uri != XSLT_NAMESPACE && !scope.excluded.contains(uri) && !scope.extension.contains(uri)
        };
        let mut namespaces: Vec<(Option<String>, String)> = scope
            .namespaces
            .iter()
            .filter(|(_, uri)| keep(uri))
            .map(|(prefix, uri)| (Some(prefix.clone()), uri.clone()))
            .collect();
        namespaces.sort();
        if let Some(uri) = &scope.default_namespace
            && keep(uri)
        {
            namespaces.insert(0, (None, uri.clone()));
        }
        namespaces
    }

    /// Splits the attributes of a non-XSLT element into those in the XSLT namespace
    /// (returned by local name) and the rest.
    fn split_xsl_attributes(
        &self,
        attrs: OwnedAttributes,
    ) -> Result<(OwnedAttributes, OwnedAttributes), XsltError> {
        let mut xsl = Vec::new();
        let mut rest = Vec::new();
        for (key, value) in attrs {
            let key_str = from_utf8(&key)?;
            match key_str.split_once(':') {
                Some((prefix, local))
                    if self.lookup_prefix(prefix).as_deref() == Some(XSLT_NAMESPACE) =>
                {
                    xsl.push((local.as_bytes().to_vec(), value));
                }
                _ => rest.push((key, value)),
            }
        }
        Ok((xsl, rest))
    }

    fn classify(
        &mut self,
        name: &QName,
        attrs: OwnedAttributes,
    ) -> Result<(ElementKind, OwnedAttributes), XsltError> {
        if name.namespace.as_deref() == Some(XSLT_NAMESPACE) {
            if matches!(name.local_part.as_str(), "stylesheet" | "transform") {
                let excluded = get_attr_optional(&attrs, b"exclude-result-prefixes")?;
                let extension = get_attr_optional(&attrs, b"extension-element-prefixes")?;
                self.apply_prefix_lists(excluded, extension)?;
            }
            return Ok((ElementKind::Xslt(name.local_part.clone()), attrs));
        }

        let (xsl_attrs, attrs) = self.split_xsl_attributes(attrs)?;
        let excluded = get_attr_optional(&xsl_attrs, b"exclude-result-prefixes")?;
        let extension = get_attr_optional(&xsl_attrs, b"extension-element-prefixes")?;
        self.apply_prefix_lists(excluded, extension)?;

        let is_extension = name
            .namespace
            .as_ref()
            .is_some_and(|uri| self.scope().extension.contains(uri));
        if is_extension {
            return Ok((ElementKind::Extension(name.clone()), attrs));
        }
        if matches!(self.state_stack.last(), Some(BuilderState::Stylesheet))
            && !self.element_stack.is_empty()
        {
            // User-defined top-level elements carry data, not instructions.
            return Ok((ElementKind::Ignored, attrs));
        }
        Ok((ElementKind::LiteralResult(name.clone()), attrs))
    }

    fn open_frame(&mut self, kind: ElementKind) {
        self.element_stack.push(kind);
        self.instruction_stack.push(Vec::new());
    }

    fn close_frame(
        &mut self,
        kind: ElementKind,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        let body = self.instruction_stack.pop().unwrap_or_default();
        let current_state = self.state_stack.pop().unwrap_or(BuilderState::Ignored);

        match kind {
            ElementKind::Ignored => {}
            ElementKind::Extension(name) => self.handle_extension_end(name, current_state, body)?,
            ElementKind::LiteralResult(name) => {
                self.handle_literal_result_element_end(name, current_state, body, pos, source)?
            }
            ElementKind::Xslt(local) => match local.as_str() {
                "stylesheet" | "transform" => {}
                "template" => self.handle_template_end(current_state, body, pos, source)?,
                "param" | "variable" | "with-param" => {
                    self.handle_binding_end(&local, current_state, body, pos, source)?
                }
                "text" => self.handle_text_end(body)?,
                "value-of" => self.handle_value_of(current_state, pos, source)?,
                "copy-of" => self.handle_copy_of(current_state, pos, source)?,
                "copy" => self.handle_copy_end(body),
                "element" => self.handle_element_end(current_state, body, pos, source)?,
                "attribute" => self.handle_attribute_end(current_state, body, pos, source)?,
                "comment" => self.handle_comment_end(body),
                "processing-instruction" => {
                    self.handle_processing_instruction_end(current_state, body, pos, source)?
                }
                "message" => self.handle_message_end(current_state, body)?,
                "if" => self.handle_if_end(current_state, body, pos, source)?,
                "choose" => self.handle_choose_end(current_state),
                "when" => self.handle_when_end(current_state, body, pos, source)?,
                "otherwise" => self.handle_otherwise_end(body),
                "for-each" => self.handle_for_each_end(current_state, body, pos, source)?,
                "apply-templates" => self.handle_apply_templates_end(current_state)?,
                "sort" => self.handle_sort(current_state, pos, source)?,
                "call-template" => self.handle_call_template_end(current_state),
                "fallback" => self.handle_fallback_end(current_state, body),
                "import" | "include" => self.handle_import_or_include(&local, current_state, pos, source)?,
                "output" => self.handle_output(current_state)?,
                "key" => self.handle_key(current_state, pos, source)?,
                "strip-space" | "preserve-space" => {
                    self.handle_space_declaration(&local, current_state, pos, source)?
                }
                _ => {}
            },
        }

        self.scopes.pop();
        Ok(())
    }

    fn state_for_xslt_element(
        &mut self,
        local: &str,
        attrs: OwnedAttributes,
        pos: usize,
        source: &str,
    ) -> Result<BuilderState, XsltError> {
        Ok(match local {
            "stylesheet" | "transform" => BuilderState::Stylesheet,
            "template" => BuilderState::Template {
                attrs,
                params: Vec::new(),
            },
            "param" | "variable" | "with-param" => BuilderState::Binding(attrs),
            "text" => BuilderState::XslText,
            "choose" => BuilderState::Choose {
                whens: Vec::new(),
                otherwise: None,
            },
            "when" => BuilderState::When(attrs),
            "otherwise" => BuilderState::Otherwise,
            "for-each" | "apply-templates" => BuilderState::Sortable {
                attrs,
                sort_keys: Vec::new(),
                params: Vec::new(),
            },
            "call-template" => self.handle_call_template_start(attrs, pos, source)?,
            "fallback" => match self.state_stack.last() {
                Some(BuilderState::Extension { .. }) => BuilderState::Fallback,
                _ => BuilderState::Ignored,
            },
            "value-of" | "copy-of" | "copy" | "element" | "attribute" | "comment"
            | "processing-instruction" | "message" | "if" | "sort" | "import" | "include"
            | "output" | "key" | "strip-space" | "preserve-space" => {
                BuilderState::InstructionBody(attrs)
            }
            other => {
                log::warn!("Ignoring unsupported XSLT element 'xsl:{}'", other);
                BuilderState::Ignored
            }
        })
    }
}

impl StylesheetBuilder for CompilerBuilder {
    fn start_element(
        &mut self,
        name: &[u8],
        attrs: OwnedAttributes,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if matches!(self.state_stack.last(), Some(BuilderState::Ignored)) {
            let scope = self.scope().clone();
            self.scopes.push(scope);
            self.open_frame(ElementKind::Ignored);
            self.state_stack.push(BuilderState::Ignored);
            return Ok(());
        }

        let attrs = self.enter_scope(attrs)?;
        let name = self.resolve_qname(from_utf8(name)?, true, pos, source)?;
        let (kind, attrs) = self.classify(&name, attrs)?;

        if self.element_stack.is_empty()
            && let ElementKind::LiteralResult(_) = kind
        {
            // A simplified stylesheet: the whole document is the template for "/".
            self.simplified = true;
            let scope = self.scope().clone();
            self.scopes.push(scope);
            self.open_frame(ElementKind::Xslt("template".to_string()));
            self.state_stack.push(BuilderState::Template {
                attrs: vec![(b"match".to_vec(), b"/".to_vec())],
                params: Vec::new(),
            });
        }

        let state = match &kind {
            ElementKind::Xslt(local) => self.state_for_xslt_element(local, attrs, pos, source)?,
            ElementKind::Extension(_) => BuilderState::Extension {
                attrs,
                fallback: None,
            },
            ElementKind::LiteralResult(_) => BuilderState::LiteralResult(attrs),
            ElementKind::Ignored => BuilderState::Ignored,
        };
        self.open_frame(kind);
        self.state_stack.push(state);
        Ok(())
    }

    fn end_element(&mut self, _name: &[u8], pos: usize, source: &str) -> Result<(), XsltError> {
        let kind = self.element_stack.pop().ok_or_else(|| {
            XsltError::Compilation("unbalanced end tag in stylesheet".to_string())
        })?;
        self.close_frame(kind, pos, source)?;

        if self.simplified && self.element_stack.len() == 1 {
            if let Some(kind) = self.element_stack.pop() {
                self.close_frame(kind, pos, source)?;
            }
            self.simplified = false;
        }
        Ok(())
    }

    fn text(&mut self, text: String) -> Result<(), XsltError> {
        let preserve = match self.state_stack.last() {
            Some(BuilderState::XslText) => true,
            Some(
                BuilderState::Stylesheet
                | BuilderState::Ignored
                | BuilderState::Choose { .. }
                | BuilderState::CallTemplate { .. },
            )
            | None => return Ok(()),
            Some(_) => false,
        };
        if !preserve && text.trim().is_empty() {
            return Ok(());
        }
        self.push_instruction(XsltInstruction::Text(text));
        Ok(())
    }
}

/// Compiles a single stylesheet document. `xsl:import`/`xsl:include` hrefs are recorded,
/// not followed; see [`crate::processor::XsltCompiler`] for the resolving entry point.
pub fn compile_document(
    source: &str,
    function_namespaces: FunctionNamespaces,
) -> Result<CompiledStylesheet, XsltError> {
    let mut builder = CompilerBuilder::new(function_namespaces);
    crate::parser::parse_stylesheet_content(source, &mut builder)?;
    builder.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BindingValue;
    use crate::extension::FunctionNamespace;
    use std::collections::HashMap;

    const XSL: &str = r#"xmlns:xsl="http://www.w3.org/1999/XSL/Transform""#;

    fn compile(body: &str) -> Result<CompiledStylesheet, XsltError> {
        let source = format!(r#"<xsl:stylesheet version="1.0" {}>{}</xsl:stylesheet>"#, XSL, body);
        compile_document(&source, FunctionNamespaces::new())
    }

    fn root_rule_body(sheet: &CompiledStylesheet) -> &[XsltInstruction] {
        &sheet.template_rules[&None][0].body.0
    }

    #[test]
    fn test_template_rules_and_named_templates() {
        let sheet = compile(
            r#"<xsl:template match="/"><out/></xsl:template>
               <xsl:template name="helper"><xsl:param name="p" select="1"/><x/></xsl:template>
               <xsl:template match="a" mode="m" priority="3"/>"#,
        )
        .unwrap();
        assert_eq!(sheet.template_rules[&None].len(), 1);
        let moded = &sheet.template_rules[&Some("m".to_string())][0];
        assert_eq!(moded.priority, 3.0);
        let helper = &sheet.named_templates["helper"];
        assert_eq!(helper.params.len(), 1);
        assert!(matches!(helper.params[0].value, BindingValue::Select(_)));
    }

    #[test]
    fn test_union_pattern_is_split_into_rules() {
        let sheet = compile(r#"<xsl:template match="a|*"/>"#).unwrap();
        let priorities: Vec<f64> = sheet.template_rules[&None].iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![0.0, -0.5]);
    }

    #[test]
    fn test_whitespace_text_is_dropped_except_in_xsl_text() {
        let sheet = compile(
            "<xsl:template match=\"/\">\n  <xsl:text> </xsl:text>\n  <p> hi </p>\n</xsl:template>",
        )
        .unwrap();
        let body = root_rule_body(&sheet);
        assert!(matches!(&body[0], XsltInstruction::Text(t) if t == " "));
        let XsltInstruction::LiteralElement { body: inner, .. } = &body[1] else {
            panic!("expected literal element, got {:?}", body[1]);
        };
        assert!(matches!(&inner.0[0], XsltInstruction::Text(t) if t == " hi "));
    }

    #[test]
    fn test_literal_result_element_namespaces_and_avts() {
        let sheet = compile_document(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
                    xmlns:h="http://www.w3.org/1999/xhtml" xmlns:junk="urn:junk"
                    exclude-result-prefixes="junk">
                 <xsl:template match="/"><h:a href="/{name(/*)}/x" h:class="c"/></xsl:template>
               </xsl:stylesheet>"#,
            FunctionNamespaces::new(),
        )
        .unwrap();
        let XsltInstruction::LiteralElement {
            name,
            namespaces,
            attrs,
            ..
        } = &root_rule_body(&sheet)[0]
        else {
            panic!("expected literal element");
        };
        assert_eq!(name.namespace.as_deref(), Some("http://www.w3.org/1999/xhtml"));
        assert_eq!(
            namespaces,
            &vec![(Some("h".to_string()), "http://www.w3.org/1999/xhtml".to_string())]
        );
        assert_eq!(attrs.len(), 2);
        assert!(attrs[0].1.as_static().is_none());
        assert_eq!(attrs[1].0.namespace.as_deref(), Some("http://www.w3.org/1999/xhtml"));
    }

    #[test]
    fn test_extension_elements_and_fallback() {
        let sheet = compile_document(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
                    xmlns:e="urn:ext" extension-element-prefixes="e">
                 <xsl:template match="/">
                   <e:loop key="rows" dest="row"><xsl:fallback>none</xsl:fallback><td/></e:loop>
                 </xsl:template>
               </xsl:stylesheet>"#,
            FunctionNamespaces::new(),
        )
        .unwrap();
        let XsltInstruction::Extension(ext) = &root_rule_body(&sheet)[0] else {
            panic!("expected extension instruction");
        };
        assert_eq!(ext.name.local_part, "loop");
        assert_eq!(ext.attributes.len(), 2);
        assert_eq!(ext.body.0.len(), 1);
        assert!(ext.fallback.is_some());
    }

    #[test]
    fn test_unknown_extension_function_fails_compilation() {
        struct Only(&'static str);
        impl FunctionNamespace for Only {
            fn has_function(&self, local_name: &str) -> bool {
                local_name == self.0
            }
        }
        let mut namespaces: FunctionNamespaces = HashMap::new();
        namespaces.insert("urn:f".to_string(), Arc::new(Only("known")));

        let source = |call: &str| {
            format!(
                r#"<xsl:stylesheet version="1.0" {} xmlns:f="urn:f"><xsl:template match="/"><xsl:value-of select="{}"/></xsl:template></xsl:stylesheet>"#,
                XSL, call
            )
        };
        assert!(compile_document(&source("f:known()"), namespaces.clone()).is_ok());
        let err = compile_document(&source("f:unknown()"), namespaces.clone()).unwrap_err();
        assert!(matches!(err, XsltError::UnknownExtensionFunction { ref name, .. } if name == "unknown"));
        let err = compile_document(&source("g:thing()"), namespaces).unwrap_err();
        assert!(matches!(err, XsltError::XPathParse(..)));
    }

    #[test]
    fn test_simplified_stylesheet() {
        let sheet = compile_document(
            r#"<html xsl:version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"><xsl:value-of select="1"/></html>"#,
            FunctionNamespaces::new(),
        )
        .unwrap();
        let XsltInstruction::LiteralElement { name, attrs, .. } = &root_rule_body(&sheet)[0] else {
            panic!("expected literal element");
        };
        assert_eq!(name.local_part, "html");
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_missing_required_attribute_reports_location() {
        let err = compile(r#"<xsl:template match="/"><xsl:value-of/></xsl:template>"#).unwrap_err();
        assert!(matches!(err, XsltError::TemplateSyntax { .. }));
    }

    #[test]
    fn test_top_level_declarations() {
        let sheet = compile(
            r#"<xsl:output method="html" omit-xml-declaration="yes"/>
               <xsl:strip-space elements="*"/>
               <xsl:key name="k" match="item" use="@id"/>
               <xsl:param name="who" select="'world'"/>
               <xsl:variable name="v">text</xsl:variable>
               <xsl:import href="base.xsl"/>"#,
        )
        .unwrap();
        assert_eq!(sheet.output.method, Some(xdjango_xpath1::OutputMethod::Html));
        assert!(sheet.output.omit_xml_declaration);
        assert_eq!(sheet.strip_space.len(), 1);
        assert!(sheet.keys.contains_key("k"));
        assert_eq!(sheet.globals.len(), 2);
        assert!(sheet.globals[0].is_param);
        assert!(matches!(sheet.globals[1].value, BindingValue::Content(_)));
        assert_eq!(sheet.imports, vec!["base.xsl".to_string()]);
    }
}
