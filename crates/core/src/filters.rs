//! The Django template filters available in serializer field references, as in
//! `"author.name|default:anonymous|upper"`.

use crate::context::{ContextValue, capitalize_first, title_case};
use crate::error::SerializeError;

/// One `|name:argument` step of a field reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
    pub argument: Option<String>,
}

impl Filter {
    /// Parses `name` or `name:argument`. Quotes around the argument are dropped.
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((name, argument)) => Filter {
                name: name.trim().to_string(),
                argument: Some(unquote(argument.trim()).to_string()),
            },
            None => Filter {
                name: text.trim().to_string(),
                argument: None,
            },
        }
    }

    pub fn apply(&self, value: ContextValue) -> Result<ContextValue, SerializeError> {
        let result = match self.name.as_str() {
            "upper" => ContextValue::Str(value.to_string().to_uppercase()),
            "lower" => ContextValue::Str(value.to_string().to_lowercase()),
            "title" => ContextValue::Str(title_case(&value.to_string())),
            "capfirst" => ContextValue::Str(capitalize_first(&value.to_string())),
            "length" => ContextValue::Int(length(&value) as i64),
            "slugify" => ContextValue::Str(slug::slugify(value.to_string())),
            "default" => {
                if is_truthy(&value) {
                    value
                } else {
                    ContextValue::Str(self.argument.clone().unwrap_or_default())
                }
            }
            "truncatechars" => {
                let limit = self.integer_argument()?;
                ContextValue::Str(truncate_chars(&value.to_string(), limit))
            }
            "cut" => {
                let needle = self.argument.clone().unwrap_or_default();
                ContextValue::Str(value.to_string().replace(&needle, ""))
            }
            other => {
                return Err(SerializeError::Field {
                    field: other.to_string(),
                    message: "unknown filter".to_string(),
                });
            }
        };
        Ok(result)
    }

    fn integer_argument(&self) -> Result<usize, SerializeError> {
        self.argument
            .as_deref()
            .and_then(|arg| arg.parse().ok())
            .ok_or_else(|| SerializeError::Field {
                field: self.name.clone(),
                message: format!("expected an integer argument, got {:?}", self.argument),
            })
    }
}

fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote)) {
            return inner;
        }
    }
    text
}

fn length(value: &ContextValue) -> usize {
    match value {
        ContextValue::List(items) => items.len(),
        ContextValue::Map(map) => map.len(),
        ContextValue::Null => 0,
        other => other.to_string().chars().count(),
    }
}

fn is_truthy(value: &ContextValue) -> bool {
    match value {
        ContextValue::Null => false,
        ContextValue::Bool(b) => *b,
        ContextValue::Int(i) => *i != 0,
        ContextValue::Float(f) => *f != 0.0,
        ContextValue::Str(s) | ContextValue::Text(s) => !s.is_empty(),
        ContextValue::List(items) => !items.is_empty(),
        ContextValue::Map(map) => !map.is_empty(),
        ContextValue::Object(_) => true,
    }
}

/// Keeps at most `limit` characters, the last of them an ellipsis when text was cut.
fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(limit - 1).collect();
    out.push('\u{2026}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(filter: &str, value: impl Into<ContextValue>) -> String {
        Filter::parse(filter).apply(value.into()).unwrap().to_string()
    }

    #[test]
    fn test_case_filters() {
        assert_eq!(apply("upper", "hello"), "HELLO");
        assert_eq!(apply("lower", "HeLLo"), "hello");
        assert_eq!(apply("title", "the old man"), "The Old Man");
        assert_eq!(apply("capfirst", "the old man"), "The old man");
    }

    #[test]
    fn test_default_and_length() {
        assert_eq!(apply("default:anonymous", ContextValue::Null), "anonymous");
        assert_eq!(apply("default:\"n/a\"", ""), "n/a");
        assert_eq!(apply("default:x", "set"), "set");
        assert_eq!(apply("length", vec!["a", "b"]), "2");
        assert_eq!(apply("length", "s\u{ed}"), "2");
    }

    #[test]
    fn test_text_shaping_filters() {
        assert_eq!(apply("slugify", "Hello World!"), "hello-world");
        assert_eq!(apply("truncatechars:5", "abcdefgh"), "abcd\u{2026}");
        assert_eq!(apply("truncatechars:10", "abc"), "abc");
        assert_eq!(apply("cut:\" \"", "a b c"), "abc");
        assert_eq!(apply("cut:-", "a-b-c"), "abc");
    }

    #[test]
    fn test_bad_filters_are_errors() {
        assert!(Filter::parse("shout").apply("x".into()).is_err());
        assert!(Filter::parse("truncatechars:many").apply("x".into()).is_err());
    }
}
