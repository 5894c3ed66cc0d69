//! Turns records into XML a stylesheet can walk.
//!
//! A [`FieldMap`] names the output attributes and the record field each one is rendered
//! from:
//!
//! ```text
//! FieldMap::new()
//!     .field("username", "user.username")
//!     .field("joined", "date_joined|default:never")
//! ```
//!
//! Serializing three users produces
//!
//! ```text
//! <users>
//!   <user username="ada" joined="1843"/>
//!   ...
//! </users>
//! ```
//!
//! The root tag is the lower-cased record type name plus `s`. Fields whose value is
//! [`ContextValue::Text`] become child elements instead of attributes.

use crate::context::{ContextObject, ContextValue, TemplateContext};
use crate::error::{RenderError, ResolveError, SerializeError};
use crate::filters::Filter;
use crate::renderer::is_xml_name;
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use xdjango_xpath1::{DocumentBuilder, Node, QName, SerializeOptions, XPathValue, serialize_node};

/// A row of named field values.
pub type Record = BTreeMap<String, ContextValue>;

/// One row handed to the serializer by a [`RecordSource`].
#[derive(Debug, Clone)]
pub enum Row {
    Fields(Record),
    /// XML the record rendered for itself, used when there is no field map.
    Rendered(XPathValue),
}

/// Where serialized rows come from.
pub trait RecordSource: Send + Sync + fmt::Debug {
    /// The record type name, e.g. `User`.
    fn type_name(&self) -> String;

    /// Produces every row. `fields` lists the top-level fields the field map reads; it is
    /// empty when there is no field map.
    fn rows(&self, fields: &[String]) -> Result<Vec<Row>, SerializeError>;
}

/// A reference to a record field: a dotted path plus filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub path: String,
    pub filters: Vec<Filter>,
}

impl FieldRef {
    pub fn parse(reference: &str) -> Self {
        let mut parts = reference.split('|');
        let path = parts.next().unwrap_or_default().trim().to_string();
        FieldRef {
            path,
            filters: parts.map(Filter::parse).collect(),
        }
    }

    /// The first segment of the path, the field a bulk query has to fetch.
    pub fn top_level(&self) -> &str {
        self.path.split('.').next().unwrap_or_default()
    }

    /// Renders the reference against one record, the way `{{ path|filters }}` would.
    pub fn render(&self, record: &TemplateContext) -> Result<ContextValue, SerializeError> {
        let mut value = match record.resolve(&self.path) {
            Ok(value) => value,
            Err(ResolveError::Missing { .. }) => ContextValue::Null,
            Err(e) => return Err(e.into()),
        };
        for filter in &self.filters {
            value = filter.apply(value)?;
        }
        Ok(value)
    }
}

/// Output names mapped to field references, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: Vec<(String, FieldRef)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, reference: &str) -> Self {
        self.fields.push((name.into(), FieldRef::parse(reference)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRef)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// The distinct top-level fields the map reads, in first-use order.
    pub fn top_level_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for (_, field) in &self.fields {
            let top = field.top_level();
            if !fields.iter().any(|f| f == top) {
                fields.push(top.to_string());
            }
        }
        fields
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(FieldMap::new(), |map, (name, reference)| map.field(name, reference.as_ref()))
    }
}

/// A small element tree, built up in memory and written out as one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBuilder {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<ElementContent>,
}

#[derive(Debug, Clone, PartialEq)]
enum ElementContent {
    Element(ElementBuilder),
    Text(String),
    Copy(Node),
}

impl ElementBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Sets an attribute, replacing an earlier value of the same name.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(ElementContent::Text(text.into()));
    }

    pub fn child(mut self, child: ElementBuilder) -> Self {
        self.push(child);
        self
    }

    pub fn push(&mut self, child: ElementBuilder) {
        self.children.push(ElementContent::Element(child));
    }

    /// Appends a copy of an existing node (an element, or a document's children).
    pub fn push_node(&mut self, node: Node) {
        self.children.push(ElementContent::Copy(node));
    }

    /// Builds the tree and returns its document element.
    pub fn build(&self) -> Result<Node, SerializeError> {
        let mut builder = DocumentBuilder::new();
        self.write(&mut builder)?;
        let root = builder.finish();
        root.document_element()
            .ok_or_else(|| SerializeError::Source("element tree produced no element".to_string()))
    }

    fn write(&self, builder: &mut DocumentBuilder) -> Result<(), SerializeError> {
        if !is_xml_name(&self.name) {
            return Err(SerializeError::Field {
                field: self.name.clone(),
                message: "not a valid element name".to_string(),
            });
        }
        builder.start_element(QName::local(&self.name));
        for (name, value) in &self.attributes {
            if !is_xml_name(name) {
                return Err(SerializeError::Field {
                    field: name.clone(),
                    message: "not a valid attribute name".to_string(),
                });
            }
            builder.attribute(QName::local(name), value.clone());
        }
        for child in &self.children {
            match child {
                ElementContent::Element(element) => element.write(builder)?,
                ElementContent::Text(text) => builder.text(text),
                ElementContent::Copy(node) => builder.copy_node(node),
            }
        }
        builder.end_element();
        Ok(())
    }
}

/// Serializes a record source once and keeps the result.
pub struct XmlSerializer {
    source: Box<dyn RecordSource>,
    field_map: FieldMap,
    cached: OnceCell<Node>,
}

impl fmt::Debug for XmlSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlSerializer")
            .field("source", &self.source)
            .field("field_map", &self.field_map)
            .field("cached", &self.cached.get().is_some())
            .finish()
    }
}

impl XmlSerializer {
    pub fn new(source: impl RecordSource + 'static, field_map: FieldMap) -> Self {
        Self {
            source: Box::new(source),
            field_map,
            cached: OnceCell::new(),
        }
    }

    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    /// The serialized root element. Computed on first use; later calls return the same
    /// node.
    pub fn xml(&self) -> Result<&Node, SerializeError> {
        self.cached.get_or_try_init(|| self.build())
    }

    /// The serialized XML as text.
    pub fn to_xml_string(&self) -> Result<String, SerializeError> {
        Ok(serialize_node(self.xml()?, &SerializeOptions::fragment())?)
    }

    fn build(&self) -> Result<Node, SerializeError> {
        let type_name = self.source.type_name().to_lowercase();
        log::debug!(target: "xdjango::serializer", "Serializing {} rows", type_name);

        let fields = self.field_map.top_level_fields();
        let mut root = ElementBuilder::new(format!("{}s", type_name));
        for row in self.source.rows(&fields)? {
            let mut child = ElementBuilder::new(&type_name);
            match row {
                Row::Fields(record) => self.populate(&mut child, record)?,
                Row::Rendered(value) => append_rendered(&mut child, value)?,
            }
            root.push(child);
        }
        root.build()
    }

    fn populate(&self, child: &mut ElementBuilder, record: Record) -> Result<(), SerializeError> {
        let text_fields: Vec<String> = record
            .iter()
            .filter(|(_, value)| matches!(value, ContextValue::Text(_)))
            .map(|(name, _)| name.clone())
            .collect();
        let context: TemplateContext = record.into_iter().collect();

        for (name, field) in self.field_map.iter() {
            let rendered = field.render(&context)?.to_string();
            if text_fields.iter().any(|f| f == field.top_level()) {
                child.push(ElementBuilder::new(name).text(rendered));
            } else {
                child.set_attr(name, rendered);
            }
        }
        Ok(())
    }
}

fn append_rendered(child: &mut ElementBuilder, value: XPathValue) -> Result<(), SerializeError> {
    match value {
        XPathValue::NodeSet(nodes) => {
            for node in nodes {
                child.push_node(node);
            }
        }
        XPathValue::String(text) if text.trim_start().starts_with('<') => {
            let parsed = xdjango_xpath1::parse_document(&text)?;
            child.push_node(parsed);
        }
        other => child.push_text(other.to_string()),
    }
    Ok(())
}

impl ContextObject for XmlSerializer {
    fn type_name(&self) -> String {
        self.source.type_name()
    }

    fn render_xml(&self, _args: &[XPathValue]) -> Option<Result<XPathValue, RenderError>> {
        Some(
            self.xml()
                .map(|node| XPathValue::from(node.clone()))
                .map_err(|e| RenderError::Failed(e.to_string())),
        )
    }

    fn display(&self) -> String {
        self.to_xml_string().unwrap_or_default()
    }
}

/// Rows given as plain mappings, serialized under an explicit type name.
#[derive(Debug)]
pub struct IterRecords {
    name: String,
    rows: Vec<ContextValue>,
}

impl IterRecords {
    pub fn new<T: Into<ContextValue>>(rows: impl IntoIterator<Item = T>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: rows.into_iter().map(Into::into).collect(),
        }
    }
}

impl RecordSource for IterRecords {
    fn type_name(&self) -> String {
        self.name.clone()
    }

    fn rows(&self, fields: &[String]) -> Result<Vec<Row>, SerializeError> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = Record::new();
                for field in fields {
                    let value = row.lookup(field)?.unwrap_or_default();
                    record.insert(field.clone(), value);
                }
                Ok(Row::Fields(record))
            })
            .collect()
    }
}

/// Serializes plain mapping rows as `<{name}s><{name} .../>...</{name}s>`.
pub fn xmlify_iter<T: Into<ContextValue>>(
    rows: impl IntoIterator<Item = T>,
    name: impl Into<String>,
    field_map: FieldMap,
) -> XmlSerializer {
    XmlSerializer::new(IterRecords::new(rows, name), field_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<serde_json::Value> {
        vec![
            json!({"a": 10, "b": 20, "c": 40}),
            json!({"a": 11, "b": 21, "c": 41}),
            json!({"a": 12, "b": 22, "c": 42}),
        ]
    }

    #[test]
    fn test_iter_rows_become_attributes() {
        let map = FieldMap::new().field("attriba", "a").field("otherattrib", "c");
        let serializer = xmlify_iter(rows(), "Simple", map);
        assert_eq!(
            serializer.to_xml_string().unwrap(),
            r#"<simples><simple attriba="10" otherattrib="40"/><simple attriba="11" otherattrib="41"/><simple attriba="12" otherattrib="42"/></simples>"#
        );
    }

    #[test]
    fn test_result_is_memoized() {
        let map = FieldMap::new().field("a", "a");
        let serializer = xmlify_iter(rows(), "Simple", map);
        let first = serializer.xml().unwrap().clone();
        let second = serializer.xml().unwrap().clone();
        assert_eq!(first.unique_id(), second.unique_id());
    }

    #[test]
    fn test_text_fields_become_child_elements() {
        let row = ContextValue::Map(
            [
                ("title".to_string(), ContextValue::from("Notes")),
                ("body".to_string(), ContextValue::Text("long & winding".to_string())),
            ]
            .into(),
        );
        let map = FieldMap::new().field("title", "title|upper").field("body", "body");
        let serializer = xmlify_iter(vec![row], "Post", map);
        assert_eq!(
            serializer.to_xml_string().unwrap(),
            r#"<posts><post title="NOTES"><body>long &amp; winding</body></post></posts>"#
        );
    }

    #[test]
    fn test_dotted_references_and_missing_fields() {
        let row = json!({"author": {"name": "ada"}});
        let map = FieldMap::new()
            .field("author", "author.name|title")
            .field("editor", "editor|default:nobody");
        assert_eq!(map.top_level_fields(), vec!["author", "editor"]);
        let serializer = xmlify_iter(vec![row], "Book", map);
        assert_eq!(
            serializer.to_xml_string().unwrap(),
            r#"<books><book author="Ada" editor="nobody"/></books>"#
        );
    }

    #[test]
    fn test_element_builder() {
        let node = ElementBuilder::new("feed")
            .attr("lang", "en")
            .child(ElementBuilder::new("entry").text("one"))
            .attr("lang", "fr")
            .build()
            .unwrap();
        assert_eq!(
            serialize_node(&node, &SerializeOptions::fragment()).unwrap(),
            r#"<feed lang="fr"><entry>one</entry></feed>"#
        );
        assert!(ElementBuilder::new("1x").build().is_err());
    }

    #[test]
    fn test_serializer_renders_itself_in_a_context() {
        let serializer = xmlify_iter(rows(), "Simple", FieldMap::new().field("b", "b"));
        let rendered = serializer.render_xml(&[]).unwrap().unwrap();
        let nodes = rendered.as_node_set().unwrap();
        assert_eq!(nodes[0].name().unwrap().local_part, "simples");
        assert_eq!(nodes[0].children().len(), 3);
    }
}
