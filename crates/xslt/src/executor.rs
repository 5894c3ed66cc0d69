//! XSLT 1.0 template execution engine.
//!
//! [`TemplateExecutor`] interprets a [`CompiledStylesheet`] against an input tree and
//! writes the result through an [`OutputBuilder`].
//!
//! The executor maintains:
//! - **Variable stack**: one scope per template invocation and per instruction body
//! - **Key indexes**: built once from the stylesheet's `xsl:key` declarations
//! - **Mode state**: the mode of the innermost `xsl:apply-templates`
//! - **Extensions**: the host's extension functions and elements for this run

use crate::ast::{
    AttributeValueTemplate, AvtPart, BindingValue, CompiledStylesheet, Param, PreparsedTemplate,
    SortDataType, SortKey, SortOrder, TemplateRule, XPathExpr, XsltInstruction,
};
use crate::executor_handlers as handlers;
use crate::extension::Extensions;
use crate::output::OutputBuilder;
use std::cmp::Ordering;
use std::collections::HashMap;
use xdjango_xpath1::{
    DocumentBuilder, EvaluationContext, FunctionRegistry, KeyIndexes, NamespaceMap, Node,
    NodeType, XPathError, XPathValue,
};

#[derive(Debug, Clone)]
pub enum ExecutionError {
    XPath(String),
    UnknownNamedTemplate(String),
    TypeError(String),
    UnknownExtensionElement(String),
    /// `xsl:message terminate="yes"` was executed.
    Terminated(String),
    /// A failure reported by a host extension.
    Extension(String),
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionError::XPath(msg) => write!(f, "XPath evaluation failed: {}", msg),
            ExecutionError::UnknownNamedTemplate(name) => {
                write!(f, "Call to unknown named template: '{}'", name)
            }
            ExecutionError::TypeError(msg) => write!(f, "Type error: {}", msg),
            ExecutionError::UnknownExtensionElement(name) => {
                write!(f, "No implementation for extension element '{}' and no fallback", name)
            }
            ExecutionError::Terminated(msg) => write!(f, "Transformation terminated: {}", msg),
            ExecutionError::Extension(msg) => write!(f, "Extension failed: {}", msg),
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<XPathError> for ExecutionError {
    fn from(e: XPathError) -> Self {
        ExecutionError::XPath(e.to_string())
    }
}

pub struct TemplateExecutor<'a> {
    pub(crate) stylesheet: &'a CompiledStylesheet,
    pub(crate) root_node: Node,
    pub(crate) variable_stack: Vec<HashMap<String, XPathValue>>,
    pub(crate) functions: FunctionRegistry,
    pub(crate) key_indexes: KeyIndexes,
    pub(crate) current_mode: Option<String>,
    pub(crate) extensions: Extensions<'a>,
    pub(crate) strict: bool,
    /// Match patterns may not reference variables; they are evaluated against this.
    no_variables: HashMap<String, XPathValue>,
    no_namespaces: NamespaceMap,
}

impl<'a> TemplateExecutor<'a> {
    /// Prepares an execution: strips whitespace per `xsl:strip-space`, evaluates global
    /// variables and parameters (`params` override `xsl:param` defaults), and builds the key
    /// indexes.
    pub fn new(
        stylesheet: &'a CompiledStylesheet,
        root_node: Node,
        params: &HashMap<String, String>,
        extensions: Extensions<'a>,
    ) -> Result<Self, ExecutionError> {
        let root_node = if stylesheet.strip_space.is_empty() {
            root_node
        } else {
            strip_whitespace(stylesheet, &root_node)
        };

        let mut executor = Self {
            stylesheet,
            root_node,
            variable_stack: vec![HashMap::new()],
            functions: FunctionRegistry::default(),
            key_indexes: KeyIndexes::new(),
            current_mode: None,
            extensions,
            strict: true,
            no_variables: HashMap::new(),
            no_namespaces: NamespaceMap::new(),
        };

        executor.initialize_global_variables(params)?;
        executor.build_key_indexes()?;
        Ok(executor)
    }

    fn initialize_global_variables(
        &mut self,
        params: &HashMap<String, String>,
    ) -> Result<(), ExecutionError> {
        let stylesheet = self.stylesheet;
        let root = self.root_node.clone();
        for global in &stylesheet.globals {
            let value = match params.get(&global.name) {
                Some(passed) if global.is_param => XPathValue::String(passed.clone()),
                _ => self.evaluate_binding(&global.value, &root, 1, 1)?,
            };
            self.set_variable_in_current_scope(global.name.clone(), value);
        }
        Ok(())
    }

    fn build_key_indexes(&mut self) -> Result<(), ExecutionError> {
        let stylesheet = self.stylesheet;
        let mut indexes = KeyIndexes::new();
        for (key_name, declarations) in &stylesheet.keys {
            let mut index: HashMap<String, Vec<Node>> = HashMap::new();
            let mut pending = vec![self.root_node.clone()];
            while let Some(node) = pending.pop() {
                for decl in declarations {
                    if self.pattern_matches(&decl.pattern, &node)? {
                        for key in self.key_values(&decl.use_expr, &node)? {
                            index.entry(key).or_default().push(node.clone());
                        }
                    }
                }
                pending.extend(node.attributes());
                pending.extend(node.children());
            }
            for nodes in index.values_mut() {
                nodes.sort();
                nodes.dedup();
            }
            indexes.insert(key_name.clone(), index);
        }
        self.key_indexes = indexes;
        Ok(())
    }

    fn key_values(&self, use_expr: &XPathExpr, node: &Node) -> Result<Vec<String>, ExecutionError> {
        Ok(match self.evaluate(use_expr, node, 1, 1)? {
            XPathValue::NodeSet(nodes) => nodes.iter().map(Node::string_value).collect(),
            other => vec![other.to_string()],
        })
    }

    /// Runs the transformation from the root node in the default mode.
    pub fn execute(&mut self, builder: &mut dyn OutputBuilder) -> Result<(), ExecutionError> {
        let root = self.root_node.clone();
        self.apply_templates_to_nodes(std::slice::from_ref(&root), None, Vec::new(), builder)
    }

    pub(crate) fn push_scope(&mut self) {
        self.variable_stack.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        if self.variable_stack.len() > 1 {
            self.variable_stack.pop();
        }
    }

    pub(crate) fn set_variable_in_current_scope(&mut self, name: String, value: XPathValue) {
        if let Some(scope) = self.variable_stack.last_mut() {
            scope.insert(name, value);
        }
    }

    pub(crate) fn get_merged_variables(&self) -> HashMap<String, XPathValue> {
        let mut merged = HashMap::new();
        for scope in &self.variable_stack {
            merged.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    pub(crate) fn get_eval_context<'c>(
        &'c self,
        context_node: &'c Node,
        variables: &'c HashMap<String, XPathValue>,
        namespaces: &'c NamespaceMap,
        context_position: usize,
        context_size: usize,
    ) -> EvaluationContext<'c> {
        let e_ctx = EvaluationContext::new(
            context_node,
            &self.root_node,
            &self.functions,
            context_position,
            context_size,
            variables,
            Some(&self.key_indexes),
            self.strict,
        )
        .with_namespaces(namespaces);
        match self.extensions.functions {
            Some(functions) => e_ctx.with_extensions(functions),
            None => e_ctx,
        }
    }

    /// Evaluates an expression with the variables currently in scope.
    pub(crate) fn evaluate(
        &self,
        expr: &XPathExpr,
        context_node: &Node,
        context_position: usize,
        context_size: usize,
    ) -> Result<XPathValue, ExecutionError> {
        let merged_vars = self.get_merged_variables();
        let e_ctx = self.get_eval_context(
            context_node,
            &merged_vars,
            &expr.namespaces,
            context_position,
            context_size,
        );
        xdjango_xpath1::evaluate(&expr.expr, &e_ctx).map_err(|e| {
            ExecutionError::XPath(format!("in '{}': {}", expr.source, e))
        })
    }

    pub(crate) fn evaluate_nodes(
        &self,
        expr: &XPathExpr,
        context_node: &Node,
        context_position: usize,
        context_size: usize,
    ) -> Result<Vec<Node>, ExecutionError> {
        match self.evaluate(expr, context_node, context_position, context_size)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(ExecutionError::TypeError(format!(
                "'{}' evaluated to a {}, expected a node-set",
                expr.source,
                other.type_name()
            ))),
        }
    }

    pub(crate) fn evaluate_avt(
        &self,
        avt: &AttributeValueTemplate,
        context_node: &Node,
        context_position: usize,
        context_size: usize,
    ) -> Result<String, ExecutionError> {
        let mut result = String::new();
        for part in &avt.0 {
            match part {
                AvtPart::Static(s) => result.push_str(s),
                AvtPart::Dynamic(expr) => {
                    let value = self.evaluate(expr, context_node, context_position, context_size)?;
                    result.push_str(&value.to_string());
                }
            }
        }
        Ok(result)
    }

    /// Computes the value of a variable or parameter binding. Content becomes a result tree
    /// fragment: the root node of a new document.
    pub(crate) fn evaluate_binding(
        &mut self,
        value: &'a BindingValue,
        context_node: &Node,
        context_position: usize,
        context_size: usize,
    ) -> Result<XPathValue, ExecutionError> {
        match value {
            BindingValue::Select(expr) => {
                self.evaluate(expr, context_node, context_position, context_size)
            }
            BindingValue::Content(body) => {
                let mut fragment = DocumentBuilder::new();
                self.execute_template(
                    body,
                    context_node,
                    context_position,
                    context_size,
                    &mut fragment,
                )?;
                Ok(XPathValue::NodeSet(vec![fragment.finish()]))
            }
            BindingValue::Empty => Ok(XPathValue::String(String::new())),
        }
    }

    /// Binds a template's declared parameters in the current scope, taking passed values
    /// first and evaluating defaults otherwise.
    pub(crate) fn bind_params(
        &mut self,
        declared: &'a [Param],
        mut passed: Vec<(String, XPathValue)>,
        context_node: &Node,
        context_position: usize,
        context_size: usize,
    ) -> Result<(), ExecutionError> {
        for param in declared {
            let value = match passed.iter().position(|(name, _)| *name == param.name) {
                Some(i) => passed.swap_remove(i).1,
                None => {
                    self.evaluate_binding(&param.value, context_node, context_position, context_size)?
                }
            };
            self.set_variable_in_current_scope(param.name.clone(), value);
        }
        Ok(())
    }

    /// Executes a sequence of instructions in a fresh variable scope.
    pub(crate) fn execute_template(
        &mut self,
        template: &'a PreparsedTemplate,
        context_node: &Node,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        self.push_scope();
        let result = template.0.iter().try_for_each(|instruction| {
            self.execute_instruction(
                instruction,
                context_node,
                context_position,
                context_size,
                builder,
            )
        });
        self.pop_scope();
        result
    }

    fn execute_instruction(
        &mut self,
        instruction: &'a XsltInstruction,
        context_node: &Node,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        match instruction {
            XsltInstruction::Text(text) => handlers::literals::handle_text(text, builder),
            XsltInstruction::ValueOf { select } => handlers::literals::handle_value_of(
                self,
                select,
                context_node,
                context_position,
                context_size,
                builder,
            )?,
            XsltInstruction::CopyOf { select } => {
                let result = self.evaluate(select, context_node, context_position, context_size)?;
                handlers::copy::handle_copy_of(result, builder);
            }
            XsltInstruction::Copy { body } => handlers::copy::handle_copy(
                self,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            )?,
            XsltInstruction::LiteralElement {
                name,
                namespaces,
                attrs,
                body,
            } => handlers::literals::handle_literal_element(
                self,
                name,
                namespaces,
                attrs,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            )?,
            XsltInstruction::Element {
                name,
                namespace,
                scope,
                body,
            } => handlers::literals::handle_element(
                self,
                name,
                namespace.as_ref(),
                scope,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            )?,
            XsltInstruction::Attribute {
                name,
                namespace,
                scope,
                body,
            } => handlers::literals::handle_attribute(
                self,
                name,
                namespace.as_ref(),
                scope,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            )?,
            XsltInstruction::Comment { body } => {
                let text =
                    self.collect_text(body, context_node, context_position, context_size)?;
                builder.comment(&text);
            }
            XsltInstruction::ProcessingInstruction { name, body } => {
                let target =
                    self.evaluate_avt(name, context_node, context_position, context_size)?;
                let data = self.collect_text(body, context_node, context_position, context_size)?;
                builder.processing_instruction(target.trim(), &data);
            }
            XsltInstruction::If { test, body } => handlers::control_flow::handle_if(
                self,
                test,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            )?,
            XsltInstruction::Choose { whens, otherwise } => handlers::control_flow::handle_choose(
                self,
                whens,
                otherwise.as_ref(),
                context_node,
                context_position,
                context_size,
                builder,
            )?,
            XsltInstruction::ForEach {
                select,
                sort_keys,
                body,
            } => handlers::for_each::handle_for_each(
                self,
                select,
                sort_keys,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            )?,
            XsltInstruction::ApplyTemplates {
                select,
                mode,
                sort_keys,
                params,
            } => handlers::apply_templates::handle_apply_templates(
                self,
                select.as_ref(),
                mode.as_deref(),
                sort_keys,
                params,
                context_node,
                context_position,
                context_size,
                builder,
            )?,
            XsltInstruction::CallTemplate { name, params } => {
                handlers::call_template::handle_call_template(
                    self,
                    name,
                    params,
                    context_node,
                    context_position,
                    context_size,
                    builder,
                )?
            }
            XsltInstruction::Variable { name, value } => {
                let value =
                    self.evaluate_binding(value, context_node, context_position, context_size)?;
                self.set_variable_in_current_scope(name.clone(), value);
            }
            XsltInstruction::Message { body, terminate } => handlers::control_flow::handle_message(
                self,
                body,
                *terminate,
                context_node,
                context_position,
                context_size,
            )?,
            XsltInstruction::Extension(extension) => handlers::extension::handle_extension(
                self,
                extension,
                context_node,
                context_position,
                context_size,
                builder,
            )?,
        }
        Ok(())
    }

    /// Runs `body` and returns only the text it produces.
    pub(crate) fn collect_text(
        &mut self,
        body: &'a PreparsedTemplate,
        context_node: &Node,
        context_position: usize,
        context_size: usize,
    ) -> Result<String, ExecutionError> {
        let mut collector = crate::output::TextCollector::default();
        self.execute_template(body, context_node, context_position, context_size, &mut collector)?;
        Ok(collector.0)
    }

    pub(crate) fn apply_templates_to_nodes(
        &mut self,
        nodes: &[Node],
        mode: Option<&str>,
        params: Vec<(String, XPathValue)>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        let context_size = nodes.len();
        let prev_mode = std::mem::replace(&mut self.current_mode, mode.map(String::from));

        let result = nodes.iter().enumerate().try_for_each(|(i, node)| {
            let context_position = i + 1;
            match self.find_matching_template(node, mode)? {
                Some(rule) => {
                    // A rule sees the global variables and its own parameters only.
                    let caller_scopes = self.variable_stack.split_off(1);
                    self.push_scope();
                    let result = self
                        .bind_params(&rule.params, params.clone(), node, context_position, context_size)
                        .and_then(|_| {
                            self.execute_template(
                                &rule.body,
                                node,
                                context_position,
                                context_size,
                                builder,
                            )
                        });
                    self.pop_scope();
                    self.variable_stack.extend(caller_scopes);
                    result
                }
                None => self.apply_builtin_template(node, mode, builder),
            }
        });

        self.current_mode = prev_mode;
        result
    }

    /// The built-in rules: descend into roots and elements, copy text and attribute values.
    fn apply_builtin_template(
        &mut self,
        node: &Node,
        mode: Option<&str>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        match node.node_type() {
            NodeType::Root | NodeType::Element => {
                let children = node.children();
                self.apply_templates_to_nodes(&children, mode, Vec::new(), builder)
            }
            NodeType::Text | NodeType::Attribute => {
                builder.text(&node.string_value());
                Ok(())
            }
            NodeType::Comment | NodeType::ProcessingInstruction => Ok(()),
        }
    }

    fn find_matching_template(
        &self,
        node: &Node,
        mode: Option<&str>,
    ) -> Result<Option<&'a TemplateRule>, ExecutionError> {
        let stylesheet = self.stylesheet;
        let Some(rules) = stylesheet.template_rules.get(&mode.map(String::from)) else {
            return Ok(None);
        };
        for rule in rules {
            if self.pattern_matches(&rule.pattern, node)? {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }

    pub(crate) fn pattern_matches(
        &self,
        pattern: &crate::pattern::Pattern,
        node: &Node,
    ) -> Result<bool, ExecutionError> {
        let base = self.get_eval_context(node, &self.no_variables, &self.no_namespaces, 1, 1);
        Ok(pattern.matches(node, &base)?)
    }

    /// Sorts `nodes` in place by the given keys; a stable sort, so ties keep document order.
    pub(crate) fn sort_node_set(
        &self,
        nodes: &mut Vec<Node>,
        sort_keys: &[SortKey],
    ) -> Result<(), ExecutionError> {
        if sort_keys.is_empty() {
            return Ok(());
        }

        let size = nodes.len();
        let mut keyed = Vec::with_capacity(size);
        for (i, node) in nodes.drain(..).enumerate() {
            let mut values = Vec::with_capacity(sort_keys.len());
            for key in sort_keys {
                values.push(self.evaluate(&key.select, &node, i + 1, size)?);
            }
            keyed.push((values, node));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for (key, (va, vb)) in sort_keys.iter().zip(a.iter().zip(b.iter())) {
                let ordering = match key.data_type {
                    SortDataType::Text => va.to_string().cmp(&vb.to_string()),
                    SortDataType::Number => compare_numbers(va.to_number(), vb.to_number()),
                };
                let ordering = match key.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        nodes.extend(keyed.into_iter().map(|(_, node)| node));
        Ok(())
    }
}

/// NaN sorts before every number.
fn compare_numbers(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Rebuilds the input without the whitespace-only text nodes that `xsl:strip-space`
/// removes.
fn strip_whitespace(stylesheet: &CompiledStylesheet, root: &Node) -> Node {
    fn strips(stylesheet: &CompiledStylesheet, element: &Node) -> bool {
        let Some(name) = element.name() else {
            return false;
        };
        stylesheet.strip_space.iter().any(|t| t.matches(name))
            && !stylesheet.preserve_space.iter().any(|t| t.matches(name))
    }

    fn copy(stylesheet: &CompiledStylesheet, node: &Node, out: &mut DocumentBuilder) {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    copy(stylesheet, &child, out);
                }
            }
            NodeType::Element => {
                if let Some(name) = node.name() {
                    out.start_element(name.clone());
                }
                for (prefix, uri) in node.declared_namespaces() {
                    out.declare_namespace(prefix.as_deref(), uri);
                }
                for attr in node.attributes() {
                    out.copy_node(&attr);
                }
                let strip_here = strips(stylesheet, node);
                for child in node.children() {
                    let whitespace_only = child.node_type() == NodeType::Text
                        && child.string_value().trim().is_empty();
                    if !(strip_here && whitespace_only) {
                        copy(stylesheet, &child, out);
                    }
                }
                out.end_element();
            }
            _ => out.copy_node(node),
        }
    }

    let mut out = DocumentBuilder::new();
    copy(stylesheet, root, &mut out);
    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_document;
    use crate::extension::FunctionNamespaces;
    use xdjango_xpath1::{SerializeOptions, parse_document, serialize_node};

    fn transform(xslt: &str, xml: &str) -> Result<String, ExecutionError> {
        let mut stylesheet = compile_document(xslt, FunctionNamespaces::new()).unwrap();
        stylesheet.sort_rules();
        let input = parse_document(xml).unwrap();
        let mut executor =
            TemplateExecutor::new(&stylesheet, input, &HashMap::new(), Extensions::none())?;
        let mut builder = DocumentBuilder::new();
        executor.execute(&mut builder)?;
        Ok(serialize_node(&builder.finish(), &SerializeOptions::fragment()).unwrap())
    }

    #[test]
    fn test_nan_sorts_first() {
        assert_eq!(compare_numbers(f64::NAN, 1.0), Ordering::Less);
        assert_eq!(compare_numbers(2.0, 1.0), Ordering::Greater);
        assert_eq!(compare_numbers(f64::NAN, f64::NAN), Ordering::Equal);
    }

    #[test]
    fn test_numeric_sort_is_stable() {
        let out = transform(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 <xsl:template match="/">
                   <xsl:for-each select="//n"><xsl:sort select="@v" data-type="number"/><xsl:value-of select="@id"/></xsl:for-each>
                 </xsl:template>
               </xsl:stylesheet>"#,
            r#"<r><n id="a" v="10"/><n id="b" v="2"/><n id="c" v="2"/><n id="d" v="x"/></r>"#,
        )
        .unwrap();
        assert_eq!(out, "dbca");
    }

    #[test]
    fn test_strip_space_removes_whitespace_only_text() {
        let xslt = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 <xsl:strip-space elements="*"/>
                 <xsl:preserve-space elements="keep"/>
                 <xsl:template match="/"><xsl:value-of select="count(//text())"/></xsl:template>
               </xsl:stylesheet>"#;
        let out = transform(xslt, "<r>\n  <a>x</a>\n  <keep> </keep>\n</r>").unwrap();
        assert_eq!(out, "2");
    }

    #[test]
    fn test_keys_index_matching_nodes() {
        let out = transform(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 <xsl:key name="by-team" match="person" use="@team"/>
                 <xsl:template match="/"><xsl:value-of select="count(key('by-team', 'red'))"/></xsl:template>
               </xsl:stylesheet>"#,
            r#"<people><person team="red"/><person team="blue"/><person team="red"/></people>"#,
        )
        .unwrap();
        assert_eq!(out, "2");
    }

    #[test]
    fn test_result_tree_fragment_variable_copies() {
        let out = transform(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 <xsl:template match="/">
                   <xsl:variable name="frag"><b>bold</b></xsl:variable>
                   <p><xsl:copy-of select="$frag"/></p>
                 </xsl:template>
               </xsl:stylesheet>"#,
            "<x/>",
        )
        .unwrap();
        assert_eq!(out, "<p><b>bold</b></p>");
    }

    #[test]
    fn test_template_rules_do_not_see_caller_locals() {
        let err = transform(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 <xsl:template match="/">
                   <xsl:variable name="local" select="1"/>
                   <xsl:apply-templates select="x"/>
                 </xsl:template>
                 <xsl:template match="x"><xsl:value-of select="$local"/></xsl:template>
               </xsl:stylesheet>"#,
            "<x/>",
        )
        .unwrap_err();
        assert!(matches!(err, ExecutionError::XPath(_)));
    }

    #[test]
    fn test_unknown_named_template() {
        let err = transform(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 <xsl:template match="/"><xsl:call-template name="nope"/></xsl:template>
               </xsl:stylesheet>"#,
            "<x/>",
        )
        .unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownNamedTemplate(name) if name == "nope"));
    }
}
