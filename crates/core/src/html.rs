//! Lenient HTML parsing for the `parsehtml` renderer.
//!
//! Markup is read with `quick-xml` with end-name checks relaxed, then repaired the way a
//! browser would: void elements never take children, stray end tags are dropped, list
//! items, cells and rows close their open siblings, and fragments are wrapped in
//! `<html><body>`. `script` and `style` bodies are raw text and an ampersand that does not
//! start a reference is kept as text. Every element of the result is in the XHTML
//! namespace.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use xdjango_xpath1::{DocumentBuilder, Node, QName, XPathError};

pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Start tags that end open elements, as `(tag, closes, stops)`. The deepest open element
/// named in `closes` is ended along with everything opened after it, searching from the
/// innermost element outwards until one named in `stops`. With no `stops` only the
/// innermost element is considered.
const IMPLICIT_CLOSES: &[(&str, &[&str], &[&str])] = &[
    ("li", &["li"], &["ul", "ol", "menu"]),
    ("dt", &["dt", "dd"], &["dl"]),
    ("dd", &["dt", "dd"], &["dl"]),
    ("tr", &["tr", "td", "th"], &["table", "thead", "tbody", "tfoot"]),
    ("td", &["td", "th"], &["tr", "table"]),
    ("th", &["td", "th"], &["tr", "table"]),
    ("option", &["option"], &["select", "datalist", "optgroup"]),
    ("p", &["p"], &[]),
];

#[derive(Debug)]
enum HtmlNode {
    Element(HtmlElement),
    Text(String),
    Comment(String),
}

#[derive(Debug, Default)]
struct HtmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<HtmlNode>,
}

/// Parses `text` as HTML and returns the root of an XHTML document.
pub fn parse_html(text: &str) -> Result<Node, XPathError> {
    let nodes = read_nodes(text)?;
    if !nodes
        .iter()
        .any(|n| matches!(n, HtmlNode::Element(_)) || matches!(n, HtmlNode::Text(t) if !t.trim().is_empty()))
    {
        return Err(XPathError::XmlSyntax("document is empty".to_string()));
    }

    let html = into_html_element(nodes);
    let mut builder = DocumentBuilder::new();
    builder.start_element(xhtml_name(&html.name));
    builder.declare_namespace(None, XHTML_NAMESPACE);
    write_children(&mut builder, html);
    builder.end_element();
    Ok(builder.finish())
}

fn read_nodes(text: &str) -> Result<Vec<HtmlNode>, XPathError> {
    let escaped = escape_for_reader(text);
    let mut reader = Reader::from_str(&escaped);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    // open[0] collects the top-level nodes.
    let mut open: Vec<HtmlElement> = vec![HtmlElement::default()];
    loop {
        let event = reader
            .read_event()
            .map_err(|e| XPathError::XmlSyntax(format!("{} at byte {}", e, reader.error_position())))?;
        match event {
            Event::Start(e) => {
                let element = start_element(&e)?;
                close_implicitly(&mut open, &element.name);
                if VOID_ELEMENTS.contains(&element.name.as_str()) {
                    push_node(&mut open, HtmlNode::Element(element));
                } else {
                    open.push(element);
                }
            }
            Event::Empty(e) => {
                let element = start_element(&e)?;
                push_node(&mut open, HtmlNode::Element(element));
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if let Some(depth) = open.iter().skip(1).rposition(|el| el.name == name) {
                    while open.len() > depth + 1 {
                        close_top(&mut open);
                    }
                } else {
                    log::debug!("Dropping stray end tag </{}>", name);
                }
            }
            Event::Text(e) => {
                let raw = String::from_utf8_lossy(e.as_ref()).into_owned();
                push_text(&mut open, &raw);
            }
            Event::CData(e) => {
                push_text(&mut open, &String::from_utf8_lossy(e.as_ref()));
            }
            Event::GeneralRef(e) => {
                let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                match resolve_entity(&name) {
                    Some(c) => push_text(&mut open, &c.to_string()),
                    None => push_text(&mut open, &format!("&{};", name)),
                }
            }
            Event::Comment(e) => {
                let comment = String::from_utf8_lossy(e.as_ref()).into_owned();
                push_node(&mut open, HtmlNode::Comment(comment));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    while open.len() > 1 {
        close_top(&mut open);
    }
    Ok(open.pop().map(|top| top.children).unwrap_or_default())
}

fn start_element(e: &BytesStart<'_>) -> Result<HtmlElement, XPathError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let mut attributes = Vec::new();
    for attr in e.html_attributes().with_checks(false) {
        let attr = attr.map_err(|e| XPathError::XmlSyntax(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        if key == "xmlns" || key.starts_with("xmlns:") || key.contains(':') {
            continue;
        }
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        let value = if raw.is_empty() {
            key.clone()
        } else {
            unescape_text(&raw)
        };
        if !attributes.iter().any(|(k, _): &(String, String)| *k == key) {
            attributes.push((key, value));
        }
    }
    Ok(HtmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn close_implicitly(open: &mut Vec<HtmlElement>, tag: &str) {
    let Some((_, closes, stops)) = IMPLICIT_CLOSES.iter().find(|(t, _, _)| *t == tag) else {
        return;
    };
    let mut depth = None;
    for (i, element) in open.iter().enumerate().skip(1).rev() {
        let name = element.name.as_str();
        if closes.contains(&name) {
            depth = Some(i);
        } else if stops.is_empty() || stops.contains(&name) {
            break;
        }
    }
    if let Some(depth) = depth {
        while open.len() > depth {
            close_top(open);
        }
    }
}

/// Escapes the text the XML reader would reject: the bodies of `script` and `style`
/// elements, and ampersands that do not start a character or entity reference.
fn escape_for_reader(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' if bytes[i..].starts_with(b"<!--") => {
                i = find_ignore_case(bytes, i + 4, b"-->").map_or(bytes.len(), |end| end + 3);
            }
            b'<' => {
                let Some(name) = raw_text_start(&bytes[i + 1..]) else {
                    i += 1;
                    continue;
                };
                let Some(gt) = bytes[i..].iter().position(|&b| b == b'>') else {
                    break;
                };
                let body = i + gt + 1;
                if bytes[body - 2] == b'/' {
                    i = body;
                    continue;
                }
                let close = find_ignore_case(bytes, body, format!("</{}", name).as_bytes())
                    .unwrap_or(bytes.len());
                out.push_str(&text[copied..body]);
                out.push_str(&quick_xml::escape::escape(&text[body..close]));
                copied = close;
                i = close;
            }
            b'&' if !starts_reference(&bytes[i + 1..]) => {
                out.push_str(&text[copied..i]);
                out.push_str("&amp;");
                i += 1;
                copied = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&text[copied..]);
    out
}

fn raw_text_start(tag: &[u8]) -> Option<&'static str> {
    RAW_TEXT_ELEMENTS.iter().copied().find(|name| {
        tag.len() >= name.len()
            && tag[..name.len()].eq_ignore_ascii_case(name.as_bytes())
            && tag
                .get(name.len())
                .is_none_or(|b| b.is_ascii_whitespace() || matches!(*b, b'>' | b'/'))
    })
}

fn find_ignore_case(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| p + from)
}

/// Whether `rest`, the text after an `&`, is a well-formed reference up to its `;`.
fn starts_reference(rest: &[u8]) -> bool {
    let (digit, body): (fn(&u8) -> bool, &[u8]) = match rest {
        [b'#', b'x' | b'X', tail @ ..] => (u8::is_ascii_hexdigit, tail),
        [b'#', tail @ ..] => (u8::is_ascii_digit, tail),
        [first, ..] if first.is_ascii_alphabetic() => (u8::is_ascii_alphanumeric, rest),
        _ => return false,
    };
    let len = body.iter().take_while(|&b| digit(b)).count();
    len > 0 && body.get(len) == Some(&b';')
}

fn close_top(open: &mut Vec<HtmlElement>) {
    if open.len() > 1
        && let Some(element) = open.pop()
    {
        push_node(open, HtmlNode::Element(element));
    }
}

fn push_node(open: &mut [HtmlElement], node: HtmlNode) {
    if let Some(top) = open.last_mut() {
        top.children.push(node);
    }
}

fn push_text(open: &mut [HtmlElement], text: &str) {
    if let Some(top) = open.last_mut() {
        if let Some(HtmlNode::Text(existing)) = top.children.last_mut() {
            existing.push_str(text);
        } else {
            top.children.push(HtmlNode::Text(text.to_string()));
        }
    }
}

fn unescape_text(raw: &str) -> String {
    quick_xml::escape::unescape_with(raw, |name| resolve_entity_str(name))
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn resolve_entity_str(name: &str) -> Option<&'static str> {
    Some(match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        "nbsp" => "\u{a0}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        _ => return None,
    })
}

fn resolve_entity(name: &str) -> Option<char> {
    if let Some(s) = resolve_entity_str(name) {
        return s.chars().next();
    }
    let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };
    code.and_then(char::from_u32)
}

/// Finds the document's `html` element, wrapping the content in `html` and `body` when
/// the markup is a fragment.
fn into_html_element(mut nodes: Vec<HtmlNode>) -> HtmlElement {
    let mut elements = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| matches!(n, HtmlNode::Element(_)));
    let html_at = match (elements.next(), elements.next()) {
        (Some((i, HtmlNode::Element(e))), None) if e.name == "html" => Some(i),
        _ => None,
    };
    let no_loose_text = nodes
        .iter()
        .all(|n| !matches!(n, HtmlNode::Text(t) if !t.trim().is_empty()));

    if let Some(i) = html_at
        && no_loose_text
        && let HtmlNode::Element(html) = nodes.swap_remove(i)
    {
        return html;
    }

    let body = HtmlElement {
        name: "body".to_string(),
        attributes: Vec::new(),
        children: nodes,
    };
    HtmlElement {
        name: "html".to_string(),
        attributes: Vec::new(),
        children: vec![HtmlNode::Element(body)],
    }
}

fn xhtml_name(local: &str) -> QName {
    QName::namespaced(None, local, Some(XHTML_NAMESPACE))
}

fn write_children(builder: &mut DocumentBuilder, element: HtmlElement) {
    for (key, value) in element.attributes {
        builder.attribute(QName::local(key), value);
    }
    for child in element.children {
        match child {
            HtmlNode::Element(child) => {
                builder.start_element(xhtml_name(&child.name));
                write_children(builder, child);
                builder.end_element();
            }
            HtmlNode::Text(text) => builder.text(&text),
            HtmlNode::Comment(comment) => builder.comment(&comment),
        }
    }
}
