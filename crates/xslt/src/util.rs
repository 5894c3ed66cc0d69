//! Small helpers shared by the parser driver and the compiler handlers.

use crate::ast::{AttributeValueTemplate, AvtPart};
use crate::compiler::CompilerBuilder;
use crate::error::XsltError;
use quick_xml::Decoder;
use quick_xml::events::BytesStart;
use std::str::from_utf8;

/// Attribute name/value pairs copied out of the reader buffer, values already unescaped.
pub type OwnedAttributes = Vec<(Vec<u8>, Vec<u8>)>;

pub fn get_owned_attributes(
    e: &BytesStart,
    decoder: Decoder,
) -> Result<OwnedAttributes, XsltError> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.decode_and_unescape_value(decoder)?;
        attrs.push((attr.key.as_ref().to_vec(), value.as_bytes().to_vec()));
    }
    Ok(attrs)
}

pub fn get_attr_optional(attrs: &OwnedAttributes, name: &[u8]) -> Result<Option<String>, XsltError> {
    for (key, value) in attrs {
        if key == name {
            return Ok(Some(from_utf8(value)?.to_string()));
        }
    }
    Ok(None)
}

pub fn get_attr_required(
    attrs: &OwnedAttributes,
    name: &[u8],
    element: &[u8],
    pos: usize,
    source: &str,
) -> Result<String, XsltError> {
    get_attr_optional(attrs, name)?.ok_or_else(|| XsltError::TemplateSyntax {
        msg: format!(
            "Required attribute '{}' missing on element '{}'",
            String::from_utf8_lossy(name),
            String::from_utf8_lossy(element)
        ),
        location: get_line_col_from_pos(source, pos).into(),
    })
}

pub fn get_line_col_from_pos(source: &str, pos: usize) -> (usize, usize) {
    let prefix = &source[..pos.min(source.len())];
    let line = prefix.matches('\n').count() + 1;
    let col = prefix.rfind('\n').map_or(pos + 1, |nl| pos - nl);
    (line, col)
}

/// A piece of an attribute value template before its expressions are compiled.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AvtPiece<'a> {
    Static(String),
    Expr(&'a str),
}

/// Splits `text` into literal text and `{...}` expressions. `{{` and `}}` are literal
/// braces; braces inside quoted strings belong to the expression.
pub(crate) fn split_avt(text: &str) -> Result<Vec<AvtPiece<'_>>, String> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(format!("unmatched '}}' in attribute value template '{}'", text)),
            '{' => {
                if !literal.is_empty() {
                    pieces.push(AvtPiece::Static(std::mem::take(&mut literal)));
                }
                let start = i + 1;
                let mut quote: Option<char> = None;
                let mut end = None;
                for (j, ec) in chars.by_ref() {
                    match (quote, ec) {
                        (Some(q), ec) if ec == q => quote = None,
                        (Some(_), _) => {}
                        (None, '\'' | '"') => quote = Some(ec),
                        (None, '}') => {
                            end = Some(j);
                            break;
                        }
                        _ => {}
                    }
                }
                let end = end.ok_or_else(|| {
                    format!("unterminated expression in attribute value template '{}'", text)
                })?;
                let expr = text[start..end].trim();
                if expr.is_empty() {
                    return Err(format!("empty expression in attribute value template '{}'", text));
                }
                pieces.push(AvtPiece::Expr(expr));
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        pieces.push(AvtPiece::Static(literal));
    }
    Ok(pieces)
}

pub(crate) fn parse_avt(
    builder: &CompilerBuilder,
    text: &str,
) -> Result<AttributeValueTemplate, XsltError> {
    let pieces = split_avt(text).map_err(|msg| XsltError::XPathParse(text.to_string(), msg))?;
    let mut parts = Vec::with_capacity(pieces.len());
    for piece in pieces {
        parts.push(match piece {
            AvtPiece::Static(s) => AvtPart::Static(s),
            AvtPiece::Expr(expr) => AvtPart::Dynamic(builder.parse_xpath(expr)?),
        });
    }
    Ok(AttributeValueTemplate(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_avt_keeps_literal_separators() {
        let pieces = split_avt("/{xdjango:a()}-{xdjango:b()}/index.html").unwrap();
        assert_eq!(
            pieces,
            vec![
                AvtPiece::Static("/".into()),
                AvtPiece::Expr("xdjango:a()"),
                AvtPiece::Static("-".into()),
                AvtPiece::Expr("xdjango:b()"),
                AvtPiece::Static("/index.html".into()),
            ]
        );
    }

    #[test]
    fn test_split_avt_escapes_and_quotes() {
        assert_eq!(
            split_avt("{{literal}}").unwrap(),
            vec![AvtPiece::Static("{literal}".into())]
        );
        assert_eq!(
            split_avt("{concat('}', @a)}").unwrap(),
            vec![AvtPiece::Expr("concat('}', @a)")]
        );
        assert!(split_avt("{unclosed").is_err());
        assert!(split_avt("stray}").is_err());
        assert!(split_avt("{ }").is_err());
    }

    #[test]
    fn test_line_col() {
        let source = "<a>\n  <b/>\n</a>";
        assert_eq!(get_line_col_from_pos(source, 0), (1, 1));
        assert_eq!(get_line_col_from_pos(source, 6), (2, 3));
    }
}
