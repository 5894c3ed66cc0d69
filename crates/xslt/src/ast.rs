//! The compiled form of an XSLT 1.0 stylesheet.

use crate::pattern::Pattern;
use std::collections::HashMap;
use std::sync::Arc;
use xdjango_xpath1::{Expression, NamespaceMap, OutputMethod, QName};

/// The namespace of XSLT instructions.
pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

/// An XPath expression together with the namespace bindings in scope where it was written.
#[derive(Debug, Clone)]
pub struct XPathExpr {
    pub expr: Expression,
    pub namespaces: Arc<NamespaceMap>,
    pub source: String,
}

#[derive(Debug, Clone)]
pub enum AvtPart {
    Static(String),
    Dynamic(XPathExpr),
}

/// An attribute value template such as `/{xdjango:path()}/index.html`.
#[derive(Debug, Clone)]
pub struct AttributeValueTemplate(pub Vec<AvtPart>);

impl AttributeValueTemplate {
    /// The literal value, when the template has no `{...}` parts.
    pub fn as_static(&self) -> Option<String> {
        self.0
            .iter()
            .map(|part| match part {
                AvtPart::Static(s) => Some(s.as_str()),
                AvtPart::Dynamic(_) => None,
            })
            .collect()
    }
}

/// A sequence of instructions: the body of a template, `xsl:if`, a literal element and so on.
#[derive(Debug, Clone, Default)]
pub struct PreparsedTemplate(pub Vec<XsltInstruction>);

/// How a variable, parameter or `xsl:with-param` gets its value.
#[derive(Debug, Clone)]
pub enum BindingValue {
    Select(XPathExpr),
    /// Content that is evaluated into a result tree fragment.
    Content(PreparsedTemplate),
    /// Neither `select` nor content: the empty string.
    Empty,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub value: BindingValue,
}

#[derive(Debug, Clone)]
pub struct WithParam {
    pub name: String,
    pub value: BindingValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDataType {
    #[default]
    Text,
    Number,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub select: XPathExpr,
    pub order: SortOrder,
    pub data_type: SortDataType,
}

#[derive(Debug, Clone)]
pub struct When {
    pub test: XPathExpr,
    pub body: PreparsedTemplate,
}

/// An element in an extension namespace, handed to the host at run time.
#[derive(Debug, Clone)]
pub struct ExtensionInstruction {
    pub name: QName,
    /// Attribute values exactly as written; the host decides how to interpret them.
    pub attributes: Vec<(QName, String)>,
    pub body: PreparsedTemplate,
    /// Content of `xsl:fallback` children, run when no host handles the element.
    pub fallback: Option<PreparsedTemplate>,
}

#[derive(Debug, Clone)]
pub enum XsltInstruction {
    Text(String),
    ValueOf {
        select: XPathExpr,
    },
    CopyOf {
        select: XPathExpr,
    },
    Copy {
        body: PreparsedTemplate,
    },
    LiteralElement {
        name: QName,
        namespaces: Vec<(Option<String>, String)>,
        attrs: Vec<(QName, AttributeValueTemplate)>,
        body: PreparsedTemplate,
    },
    Element {
        name: AttributeValueTemplate,
        namespace: Option<AttributeValueTemplate>,
        scope: Arc<NamespaceMap>,
        body: PreparsedTemplate,
    },
    Attribute {
        name: AttributeValueTemplate,
        namespace: Option<AttributeValueTemplate>,
        scope: Arc<NamespaceMap>,
        body: PreparsedTemplate,
    },
    Comment {
        body: PreparsedTemplate,
    },
    ProcessingInstruction {
        name: AttributeValueTemplate,
        body: PreparsedTemplate,
    },
    If {
        test: XPathExpr,
        body: PreparsedTemplate,
    },
    Choose {
        whens: Vec<When>,
        otherwise: Option<PreparsedTemplate>,
    },
    ForEach {
        select: XPathExpr,
        sort_keys: Vec<SortKey>,
        body: PreparsedTemplate,
    },
    ApplyTemplates {
        select: Option<XPathExpr>,
        mode: Option<String>,
        sort_keys: Vec<SortKey>,
        params: Vec<WithParam>,
    },
    CallTemplate {
        name: String,
        params: Vec<WithParam>,
    },
    Variable {
        name: String,
        value: BindingValue,
    },
    Message {
        body: PreparsedTemplate,
        terminate: bool,
    },
    Extension(Box<ExtensionInstruction>),
}

#[derive(Debug, Clone)]
pub struct TemplateRule {
    pub pattern: Pattern,
    pub priority: f64,
    pub mode: Option<String>,
    pub params: Vec<Param>,
    pub body: PreparsedTemplate,
}

#[derive(Debug, Clone)]
pub struct NamedTemplate {
    pub params: Vec<Param>,
    pub body: PreparsedTemplate,
}

#[derive(Debug, Clone)]
pub struct KeyDeclaration {
    pub name: String,
    pub pattern: Pattern,
    pub use_expr: XPathExpr,
}

/// A top-level `xsl:variable` or `xsl:param`.
#[derive(Debug, Clone)]
pub struct GlobalBinding {
    pub name: String,
    pub value: BindingValue,
    pub is_param: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDeclaration {
    /// `None` when the stylesheet leaves the choice to the result tree.
    pub method: Option<OutputMethod>,
    pub omit_xml_declaration: bool,
    pub encoding: String,
    pub indent: bool,
}

impl Default for OutputDeclaration {
    fn default() -> Self {
        Self {
            method: None,
            omit_xml_declaration: false,
            encoding: "UTF-8".to_string(),
            indent: false,
        }
    }
}

/// An element name test from `xsl:strip-space` or `xsl:preserve-space`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceTest {
    Any,
    Namespace(String),
    Name {
        namespace: Option<String>,
        local: String,
    },
}

impl SpaceTest {
    pub fn matches(&self, name: &QName) -> bool {
        match self {
            SpaceTest::Any => true,
            SpaceTest::Namespace(uri) => name.namespace.as_deref() == Some(uri.as_str()),
            SpaceTest::Name { namespace, local } => {
                &name.local_part == local && name.namespace == *namespace
            }
        }
    }
}

/// The compiled stylesheet: the unit the executor runs.
#[derive(Debug, Clone, Default)]
pub struct CompiledStylesheet {
    pub output: OutputDeclaration,
    /// Template rules per mode, highest priority first.
    pub template_rules: HashMap<Option<String>, Vec<TemplateRule>>,
    pub named_templates: HashMap<String, Arc<NamedTemplate>>,
    pub globals: Vec<GlobalBinding>,
    pub keys: HashMap<String, Vec<KeyDeclaration>>,
    pub strip_space: Vec<SpaceTest>,
    pub preserve_space: Vec<SpaceTest>,
    pub imports: Vec<String>,
    pub includes: Vec<String>,
}

impl CompiledStylesheet {
    /// Orders every mode's rules by descending priority. Among equal priorities the rule
    /// that appears later in the stylesheet wins.
    pub(crate) fn sort_rules(&mut self) {
        for rules in self.template_rules.values_mut() {
            rules.reverse();
            rules.sort_by(|a, b| {
                b.priority
                    .partial_cmp(&a.priority)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
    }

    /// Folds an imported stylesheet in below this one: every imported rule loses to every
    /// rule of the importing stylesheet.
    pub(crate) fn merge_imported(&mut self, imported: CompiledStylesheet) {
        const IMPORT_PRIORITY_ADJUSTMENT: f64 = -1000.0;

        for (mode, rules) in imported.template_rules {
            let target = self.template_rules.entry(mode).or_default();
            for mut rule in rules {
                rule.priority += IMPORT_PRIORITY_ADJUSTMENT;
                target.push(rule);
            }
        }
        for (name, template) in imported.named_templates {
            self.named_templates.entry(name).or_insert(template);
        }
        let mut globals = imported.globals;
        globals.retain(|g| !self.globals.iter().any(|own| own.name == g.name));
        globals.append(&mut self.globals);
        self.globals = globals;
        for (name, decls) in imported.keys {
            self.keys.entry(name).or_default().extend(decls);
        }
        self.strip_space.extend(imported.strip_space);
        self.preserve_space.extend(imported.preserve_space);
        if self.output.method.is_none() {
            self.output.method = imported.output.method;
        }
    }

    /// Folds an included stylesheet in at the same precedence.
    pub(crate) fn merge_included(&mut self, included: CompiledStylesheet) {
        for (mode, rules) in included.template_rules {
            self.template_rules.entry(mode).or_default().extend(rules);
        }
        self.named_templates.extend(included.named_templates);
        self.globals.extend(included.globals);
        for (name, decls) in included.keys {
            self.keys.entry(name).or_default().extend(decls);
        }
        self.strip_space.extend(included.strip_space);
        self.preserve_space.extend(included.preserve_space);
        if self.output.method.is_none() {
            self.output.method = included.output.method;
        }
    }
}
