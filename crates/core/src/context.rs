//! The template context: named values a stylesheet reaches through `xdjango:` calls.
//!
//! Values are looked up with Django's dotted syntax. Each segment after the first is tried,
//! in order, as a mapping key, an object attribute, a list index and finally a
//! zero-argument method, so `user.name`, `rows.0.title` and `greeting.upper` all resolve.

use crate::error::{RenderError, ResolveError};
use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use xdjango_xpath1::XPathValue;

/// An application object placed in the context.
///
/// Every method has a default, so an implementation only provides what it supports.
pub trait ContextObject: Send + Sync + fmt::Debug {
    /// The record type name, used by the serializer for element tags.
    fn type_name(&self) -> String;

    /// A named attribute or field.
    fn attribute(&self, _name: &str) -> Option<ContextValue> {
        None
    }

    /// A zero-argument method. `None` when the object has no such method.
    fn call_method(&self, _name: &str) -> Option<Result<ContextValue, ResolveError>> {
        None
    }

    /// Renders the object as XML when it is called from a stylesheet. Objects that answer
    /// `Some` take over their own rendering, whatever arguments the call carries.
    fn render_xml(&self, _args: &[XPathValue]) -> Option<Result<XPathValue, RenderError>> {
        None
    }

    /// The items of a collection-like object, in source order.
    fn iterate(&self) -> Option<Result<Box<dyn Iterator<Item = ContextValue> + '_>, ResolveError>> {
        None
    }

    /// The text used when the object is converted to a string.
    fn display(&self) -> String {
        self.type_name()
    }
}

/// A value held in a [`TemplateContext`].
#[derive(Debug, Clone, Default)]
pub enum ContextValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Long-form text. The serializer writes it as element content rather than as an
    /// attribute.
    Text(String),
    List(Vec<ContextValue>),
    Map(BTreeMap<String, ContextValue>),
    Object(Arc<dyn ContextObject>),
}

impl ContextValue {
    pub fn object(object: impl ContextObject + 'static) -> Self {
        ContextValue::Object(Arc::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ContextValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::Str(s) | ContextValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn ContextObject>> {
        match self {
            ContextValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// A short description of the value's type for log messages.
    pub fn kind(&self) -> String {
        match self {
            ContextValue::Null => "null".to_string(),
            ContextValue::Bool(_) => "bool".to_string(),
            ContextValue::Int(_) => "int".to_string(),
            ContextValue::Float(_) => "float".to_string(),
            ContextValue::Str(_) => "string".to_string(),
            ContextValue::Text(_) => "text".to_string(),
            ContextValue::List(_) => "list".to_string(),
            ContextValue::Map(_) => "map".to_string(),
            ContextValue::Object(object) => object.type_name(),
        }
    }

    /// Resolves one segment of a dotted path against this value.
    pub fn lookup(&self, segment: &str) -> Result<Option<ContextValue>, ResolveError> {
        match self {
            ContextValue::Map(map) => {
                if let Some(value) = map.get(segment) {
                    return Ok(Some(value.clone()));
                }
            }
            ContextValue::Object(object) => {
                if let Some(value) = object.attribute(segment) {
                    return Ok(Some(value));
                }
            }
            ContextValue::List(items) => {
                if let Ok(index) = segment.parse::<usize>() {
                    return Ok(items.get(index).cloned());
                }
            }
            _ => {}
        }
        self.call_method(segment)
    }

    /// Calls a zero-argument method. `Ok(None)` when the value has no such method.
    pub fn call_method(&self, name: &str) -> Result<Option<ContextValue>, ResolveError> {
        let value = match (self, name) {
            (ContextValue::Str(s) | ContextValue::Text(s), method) => {
                match string_method(s, method) {
                    Some(result) => ContextValue::Str(result),
                    None => return Ok(None),
                }
            }
            (ContextValue::List(items), "count") => ContextValue::Int(items.len() as i64),
            (ContextValue::Map(map), "count") => ContextValue::Int(map.len() as i64),
            (ContextValue::Map(map), "keys") => {
                ContextValue::List(map.keys().cloned().map(ContextValue::Str).collect())
            }
            (ContextValue::Map(map), "values") => ContextValue::List(map.values().cloned().collect()),
            (ContextValue::Map(map), "items") => ContextValue::List(
                map.iter()
                    .map(|(k, v)| ContextValue::List(vec![ContextValue::Str(k.clone()), v.clone()]))
                    .collect(),
            ),
            (ContextValue::Object(object), method) => {
                return object.call_method(method).transpose();
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// The items of a list or an iterable object.
    pub fn iterate(&self) -> Result<Box<dyn Iterator<Item = ContextValue> + '_>, ResolveError> {
        match self {
            ContextValue::List(items) => Ok(Box::new(items.iter().cloned())),
            ContextValue::Object(object) => object
                .iterate()
                .unwrap_or_else(|| Err(ResolveError::NotIterable(object.type_name()))),
            other => Err(ResolveError::NotIterable(other.kind())),
        }
    }
}

fn string_method(s: &str, method: &str) -> Option<String> {
    let result = match method {
        "upper" => s.to_uppercase(),
        "lower" => s.to_lowercase(),
        "title" => title_case(s),
        "capitalize" => {
            let lower = s.to_lowercase();
            capitalize_first(&lower)
        }
        "strip" => s.trim().to_string(),
        "lstrip" => s.trim_start().to_string(),
        "rstrip" => s.trim_end().to_string(),
        _ => return None,
    };
    Some(result)
}

/// Upper-cases the first letter of every run of letters and lower-cases the rest.
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

pub(crate) fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Null => Ok(()),
            ContextValue::Bool(b) => write!(f, "{}", b),
            ContextValue::Int(i) => write!(f, "{}", i),
            ContextValue::Float(n) => write!(f, "{}", n),
            ContextValue::Str(s) | ContextValue::Text(s) => f.write_str(s),
            ContextValue::List(items) => write!(f, "{}", items.iter().join(", ")),
            ContextValue::Map(map) => write!(
                f,
                "{}",
                map.iter().map(|(k, v)| format!("{}: {}", k, v)).join(", ")
            ),
            ContextValue::Object(object) => f.write_str(&object.display()),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Str(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Str(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

impl From<i32> for ContextValue {
    fn from(value: i32) -> Self {
        ContextValue::Int(value.into())
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Float(value)
    }
}

impl<T: Into<ContextValue>> From<Vec<T>> for ContextValue {
    fn from(values: Vec<T>) -> Self {
        ContextValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ContextValue>> From<Option<T>> for ContextValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<Arc<dyn ContextObject>> for ContextValue {
    fn from(object: Arc<dyn ContextObject>) -> Self {
        ContextValue::Object(object)
    }
}

impl From<serde_json::Value> for ContextValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ContextValue::Null,
            Value::Bool(b) => ContextValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ContextValue::Int(i),
                None => ContextValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ContextValue::Str(s),
            Value::Array(items) => ContextValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ContextValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// The variables one execution sees, as a stack of scopes searched innermost first.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    scopes: Vec<HashMap<String, ContextValue>>,
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateContext {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    /// Builds a context from a JSON object, one variable per member.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ResolveError> {
        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            serde_json::Value::Null => Ok(Self::new()),
            other => Err(ResolveError::NotAMapping(ContextValue::from(other).kind())),
        }
    }

    /// Binds `key` in the innermost scope.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(key.into(), value.into());
        }
    }

    /// Removes `key` from the innermost scope, uncovering any outer binding.
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.scopes.last_mut()?.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.scopes.iter().rev().find_map(|scope| scope.get(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Binds every pair in the innermost scope.
    pub fn update<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<ContextValue>,
    {
        for (key, value) in values {
            self.insert(key, value);
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Drops the innermost scope. The outermost scope is never dropped.
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Resolves a dotted path such as `user.profile.name`.
    pub fn resolve(&self, path: &str) -> Result<ContextValue, ResolveError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        let missing = |segment: &str| ResolveError::Missing {
            path: path.to_string(),
            segment: segment.to_string(),
        };

        let mut value = self.get(first).cloned().ok_or_else(|| missing(first))?;
        for segment in segments {
            value = value.lookup(segment)?.ok_or_else(|| missing(segment))?;
        }
        Ok(value)
    }
}

impl<K: Into<String>, V: Into<ContextValue>> FromIterator<(K, V)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = TemplateContext::new();
        context.update(iter);
        context
    }
}
