//! Writes node trees back out as text through `quick_xml::Writer`.
//!
//! Namespace declarations are fixed up while writing: an element or attribute whose
//! prefix is not bound (or bound to another URI) in the output scope gets the missing
//! `xmlns` declaration, so fragments copied between documents stay well-formed.

use super::{Node, NodeKind, QName};
use crate::error::XPathError;
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesPI, BytesStart, BytesText, Event};

/// HTML elements that never take an end tag.
const HTML_VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMethod {
    #[default]
    Xml,
    Html,
    Text,
}

impl OutputMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "xml" => Some(OutputMethod::Xml),
            "html" => Some(OutputMethod::Html),
            "text" => Some(OutputMethod::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    pub method: OutputMethod,
    pub omit_xml_declaration: bool,
    pub encoding: String,
    /// Emit a newline after the document content (xml and html methods only).
    pub trailing_newline: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            method: OutputMethod::Xml,
            omit_xml_declaration: false,
            encoding: "UTF-8".to_string(),
            trailing_newline: true,
        }
    }
}

impl SerializeOptions {
    /// Options for serializing a single fragment: no declaration, no trailing newline.
    pub fn fragment() -> Self {
        Self {
            omit_xml_declaration: true,
            trailing_newline: false,
            ..Self::default()
        }
    }
}

/// Serializes a whole result document: optional declaration, content, trailing newline.
pub fn serialize_document(root: &Node, options: &SerializeOptions) -> Result<String, XPathError> {
    if options.method == OutputMethod::Text {
        return Ok(root.string_value());
    }

    let mut out = String::new();
    if options.method == OutputMethod::Xml && !options.omit_xml_declaration {
        out.push_str(&format!(
            "<?xml version=\"1.0\" encoding=\"{}\"?>\n",
            options.encoding
        ));
    }
    let content = serialize_node(root, options)?;
    let has_content = !content.is_empty();
    out.push_str(&content);
    if options.trailing_newline && has_content {
        out.push('\n');
    }
    Ok(out)
}

/// Serializes one node (a root node serializes its children) without any document framing.
pub fn serialize_node(node: &Node, options: &SerializeOptions) -> Result<String, XPathError> {
    if options.method == OutputMethod::Text {
        return Ok(node.string_value());
    }
    let mut serializer = TreeSerializer {
        writer: Writer::new(Vec::new()),
        scopes: vec![Vec::new()],
        method: options.method,
    };
    serializer.write(node)?;
    String::from_utf8(serializer.writer.into_inner())
        .map_err(|e| XPathError::Serialize(e.to_string()))
}

struct TreeSerializer {
    writer: Writer<Vec<u8>>,
    /// Output namespace bindings, one frame per open element.
    scopes: Vec<Vec<(Option<String>, String)>>,
    method: OutputMethod,
}

fn write_error(e: impl std::fmt::Display) -> XPathError {
    XPathError::Serialize(e.to_string())
}

impl TreeSerializer {
    fn bound_uri(&self, prefix: Option<&str>) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Declares `prefix -> uri` on the element being opened unless the binding is already
    /// in effect.
    fn ensure_binding(&mut self, start: &mut BytesStart<'_>, prefix: Option<&str>, uri: &str) {
        let current = self.bound_uri(prefix).unwrap_or("");
        if current == uri {
            return;
        }
        let attr_name = match prefix {
            Some(p) => format!("xmlns:{}", p),
            None => "xmlns".to_string(),
        };
        start.push_attribute((attr_name.as_str(), uri));
        if let Some(frame) = self.scopes.last_mut() {
            frame.push((prefix.map(str::to_string), uri.to_string()));
        }
    }

    fn write(&mut self, node: &Node) -> Result<(), XPathError> {
        match node.kind() {
            NodeKind::Root => {
                for child in node.children() {
                    self.write(&child)?;
                }
            }
            NodeKind::Element { name, namespaces } => self.write_element(node, name, namespaces)?,
            NodeKind::Attribute { value, .. } => {
                // A lone attribute serializes as its value.
                self.write_text(value)?;
            }
            NodeKind::Text(text) => self.write_text(text)?,
            NodeKind::Comment(text) => {
                self.writer
                    .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                    .map_err(write_error)?;
            }
            NodeKind::ProcessingInstruction { target, data } => {
                let content = if data.is_empty() {
                    target.local_part.clone()
                } else {
                    format!("{} {}", target.local_part, data)
                };
                self.writer
                    .write_event(Event::PI(BytesPI::new(content)))
                    .map_err(write_error)?;
            }
        }
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> Result<(), XPathError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))
            .map_err(write_error)
    }

    fn write_element(
        &mut self,
        node: &Node,
        name: &QName,
        namespaces: &[(Option<String>, String)],
    ) -> Result<(), XPathError> {
        let tag = name.qualified();
        let mut start = BytesStart::new(tag.clone());
        self.scopes.push(Vec::new());

        for (prefix, uri) in namespaces {
            self.ensure_binding(&mut start, prefix.as_deref(), uri);
        }
        let element_uri = name.namespace.clone().unwrap_or_default();
        self.ensure_binding(&mut start, name.prefix.as_deref(), &element_uri);

        let attributes = node.attributes();
        for attr in &attributes {
            if let NodeKind::Attribute { name: attr_name, .. } = attr.kind()
                && let (Some(prefix), Some(uri)) = (&attr_name.prefix, &attr_name.namespace)
                && prefix != "xml"
            {
                self.ensure_binding(&mut start, Some(prefix), uri);
            }
        }
        for attr in &attributes {
            if let NodeKind::Attribute {
                name: attr_name,
                value,
            } = attr.kind()
            {
                start.push_attribute((attr_name.qualified().as_str(), value.as_str()));
            }
        }

        let children = node.children();
        let is_void = self.method == OutputMethod::Html
            && name.namespace.is_none()
            && HTML_VOID_ELEMENTS.contains(&name.local_part.to_ascii_lowercase().as_str());

        if is_void {
            self.writer
                .write_event(Event::Start(start))
                .map_err(write_error)?;
        } else if children.is_empty() && self.method == OutputMethod::Xml {
            self.writer
                .write_event(Event::Empty(start))
                .map_err(write_error)?;
        } else {
            self.writer
                .write_event(Event::Start(start))
                .map_err(write_error)?;
            for child in &children {
                self.write(child)?;
            }
            self.writer
                .write_event(Event::End(BytesEnd::new(tag)))
                .map_err(write_error)?;
        }
        self.scopes.pop();
        Ok(())
    }
}
