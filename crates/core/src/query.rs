//! Queries that keep their XML rendering through refinement.
//!
//! Wrap an application query in [`RenderableQuery`] and call
//! [`xml`](RenderableQuery::xml) to attach a serializer. Every query derived from the
//! result afterwards, through [`refine`](RenderableQuery::refine), keeps rendering the
//! rows selected when `xml` was called:
//!
//! ```text
//! let people = RenderableQuery::new(people_query);
//! let rendered = people.xml(FieldMap::new().field("name", "name"));
//! let adults = rendered.refine(|q| q.filter_age_at_least(18));
//! // `adults` still renders every person
//! ```

use crate::context::{ContextObject, ContextValue};
use crate::error::{RenderError, ResolveError, SerializeError};
use crate::serializer::{FieldMap, Record, RecordSource, Row, XmlSerializer};
use std::fmt;
use std::sync::Arc;
use xdjango_xpath1::XPathValue;

/// The record-source contract of an application query.
pub trait QuerySource: Clone + Send + Sync + fmt::Debug + 'static {
    /// The model name, e.g. `User`. Serialized tags are derived from it.
    fn model_name(&self) -> String;

    /// Bulk projection: one record per row holding only the named fields.
    fn values(&self, fields: &[String]) -> Result<Vec<Record>, SerializeError>;

    /// The rows as objects, in query order.
    fn objects(&self) -> Result<Box<dyn Iterator<Item = ContextValue> + '_>, SerializeError>;
}

/// Serializes a query, either through [`QuerySource::values`] or object by object.
#[derive(Debug)]
pub struct QueryRecords<Q: QuerySource> {
    query: Q,
    use_values: bool,
}

impl<Q: QuerySource> QueryRecords<Q> {
    pub fn new(query: Q, use_values: bool) -> Self {
        Self { query, use_values }
    }
}

impl<Q: QuerySource> RecordSource for QueryRecords<Q> {
    fn type_name(&self) -> String {
        self.query.model_name()
    }

    fn rows(&self, fields: &[String]) -> Result<Vec<Row>, SerializeError> {
        if self.use_values {
            return Ok(self
                .query
                .values(fields)?
                .into_iter()
                .map(Row::Fields)
                .collect());
        }

        let mut rows = Vec::new();
        for object in self.query.objects()? {
            if fields.is_empty() {
                rows.push(Row::Rendered(render_object(&object)?));
                continue;
            }
            let mut record = Record::new();
            for field in fields {
                let value = object.lookup(field)?.ok_or_else(|| ResolveError::Missing {
                    path: field.clone(),
                    segment: field.clone(),
                })?;
                record.insert(field.clone(), value);
            }
            rows.push(Row::Fields(record));
        }
        Ok(rows)
    }
}

fn render_object(object: &ContextValue) -> Result<XPathValue, SerializeError> {
    match object
        .as_object()
        .and_then(|o| o.render_xml(&[]))
    {
        Some(rendered) => Ok(rendered?),
        None => Err(SerializeError::Source(format!(
            "{} rows cannot render themselves; give a field map",
            object.kind()
        ))),
    }
}

/// Serializes `query` through `field_map`.
pub fn xmlify<Q: QuerySource>(query: Q, use_values: bool, field_map: FieldMap) -> XmlSerializer {
    XmlSerializer::new(QueryRecords::new(query, use_values), field_map)
}

/// A query that can attach XML rendering, and keeps it through refinement.
#[derive(Clone)]
pub struct RenderableQuery<Q: QuerySource> {
    query: Q,
    use_values: bool,
    serializer: Option<Arc<XmlSerializer>>,
}

impl<Q: QuerySource> fmt::Debug for RenderableQuery<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderableQuery")
            .field("query", &self.query)
            .field("use_values", &self.use_values)
            .field("renders", &self.serializer.is_some())
            .finish()
    }
}

impl<Q: QuerySource> RenderableQuery<Q> {
    /// Wraps `query`, serializing through bulk projection by default.
    pub fn new(query: Q) -> Self {
        Self {
            query,
            use_values: true,
            serializer: None,
        }
    }

    pub fn with_use_values(mut self, use_values: bool) -> Self {
        self.use_values = use_values;
        self
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn use_values(&self) -> bool {
        self.use_values
    }

    /// The serializer attached by [`xml`](Self::xml), if any.
    pub fn serializer(&self) -> Option<&Arc<XmlSerializer>> {
        self.serializer.as_ref()
    }

    /// Derives a new query. The projection flag and any attached serializer carry over.
    pub fn refine(&self, refinement: impl FnOnce(&Q) -> Q) -> Self {
        Self {
            query: refinement(&self.query),
            use_values: self.use_values,
            serializer: self.serializer.clone(),
        }
    }

    /// A copy of this query that renders the rows it selects now through `field_map`.
    pub fn xml(&self, field_map: FieldMap) -> Self {
        self.attach(self.use_values, field_map)
    }

    /// Like [`xml`](Self::xml), but always reads rows as objects.
    pub fn xml_objects(&self, field_map: FieldMap) -> Self {
        self.attach(false, field_map)
    }

    fn attach(&self, use_values: bool, field_map: FieldMap) -> Self {
        let serializer = xmlify(self.query.clone(), use_values, field_map);
        Self {
            query: self.query.clone(),
            use_values: self.use_values,
            serializer: Some(Arc::new(serializer)),
        }
    }
}

impl<Q: QuerySource> ContextObject for RenderableQuery<Q> {
    fn type_name(&self) -> String {
        self.query.model_name()
    }

    fn call_method(&self, name: &str) -> Option<Result<ContextValue, ResolveError>> {
        match name {
            "count" => Some(
                self.query
                    .objects()
                    .map(|rows| ContextValue::Int(rows.count() as i64))
                    .map_err(|e| ResolveError::Method {
                        method: "count".to_string(),
                        message: e.to_string(),
                    }),
            ),
            _ => None,
        }
    }

    fn render_xml(&self, args: &[XPathValue]) -> Option<Result<XPathValue, RenderError>> {
        self.serializer.as_ref()?.render_xml(args)
    }

    fn iterate(&self) -> Option<Result<Box<dyn Iterator<Item = ContextValue> + '_>, ResolveError>> {
        Some(self.query.objects().map_err(|e| ResolveError::Method {
            method: "iterate".to_string(),
            message: e.to_string(),
        }))
    }
}

/// Hands out renderable queries with a fixed projection mode.
#[derive(Debug, Clone, Copy)]
pub struct RenderingManager {
    use_values: bool,
}

impl Default for RenderingManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RenderingManager {
    pub fn new(use_values: bool) -> Self {
        Self { use_values }
    }

    pub fn wrap<Q: QuerySource>(&self, query: Q) -> RenderableQuery<Q> {
        RenderableQuery::new(query).with_use_values(self.use_values)
    }
}
