//! Finds the `xdjango:` calls a stylesheet makes, before it is compiled.
//!
//! The compiler rejects calls into the extension namespace that nobody has registered,
//! so every name has to be known up front. The scanner reads the attribute values of a
//! stylesheet: `select`, `test` and the other expression attributes of XSLT
//! instructions as XPath, every other attribute as an attribute value template. Inside
//! an expression it skips string literals and picks out `prefix:name(` where the prefix
//! is bound to the extension namespace.
//!
//! [`ScanningResolver`] runs the scanner over every document an `xsl:import` or
//! `xsl:include` pulls in, as the compiler loads it.

use crate::XDJANGO_NAMESPACE;
use crate::registry::{ContextFunctionRegistry, root_name};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use xdjango_xslt::{DocumentResolver, ResolvedDocument, XSLT_NAMESPACE, XsltError, resolve_uri, uri_scheme};

/// Attributes of XSLT instructions that hold an expression or a pattern.
const EXPRESSION_ATTRIBUTES: &[&str] = &["select", "test", "match", "use", "count", "from", "value"];

/// Schemes the resolver never loads.
const DECLINED_SCHEMES: &[&str] = &["http", "django", "querydirect"];

/// Returns the distinct function names called through the extension namespace, in
/// order of first appearance. Dotted calls report the full called name
/// (`greet.upper`).
pub fn scan_stylesheet(source: &str) -> Result<Vec<String>, XsltError> {
    let mut reader = Reader::from_str(source);
    let mut extension_prefixes: HashSet<String> = HashSet::from(["xdjango".to_string()]);
    let mut xslt_prefixes: HashSet<String> = HashSet::from(["xsl".to_string()]);
    let mut found = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let mut attributes = Vec::new();
                for attr in e.attributes() {
                    let attr = attr?;
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = match attr.decode_and_unescape_value(reader.decoder()) {
                        Ok(value) => value.into_owned(),
                        Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
                    };
                    if let Some(prefix) = key.strip_prefix("xmlns:") {
                        if value == XDJANGO_NAMESPACE {
                            extension_prefixes.insert(prefix.to_string());
                        } else if value == XSLT_NAMESPACE {
                            xslt_prefixes.insert(prefix.to_string());
                        }
                        continue;
                    }
                    if key != "xmlns" {
                        attributes.push((key, value));
                    }
                }

                let element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let is_instruction = element
                    .split_once(':')
                    .is_some_and(|(prefix, _)| xslt_prefixes.contains(prefix));
                for (key, value) in attributes {
                    if is_instruction && EXPRESSION_ATTRIBUTES.contains(&key.as_str()) {
                        scan_expression(&value, &extension_prefixes, &mut found);
                    } else {
                        scan_avt(&value, &extension_prefixes, &mut found);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Collects `prefix:name(` calls from one XPath expression.
fn scan_expression(expr: &str, prefixes: &HashSet<String>, found: &mut Vec<String>) {
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' {
            i += 1;
            while i < chars.len() && chars[i] != c {
                i += 1;
            }
            i += 1;
            continue;
        }
        if !is_name_start(c) {
            i += 1;
            continue;
        }

        let after_dollar = i > 0 && chars[i - 1] == '$';
        let start = i;
        while i < chars.len() && is_name_char(chars[i]) {
            i += 1;
        }
        let prefix: String = chars[start..i].iter().collect();

        // prefix ':' local, but not an axis ('::')
        let has_local = i + 1 < chars.len()
            && chars[i] == ':'
            && chars[i + 1] != ':'
            && is_name_start(chars[i + 1]);
        if !has_local {
            continue;
        }
        let local_start = i + 1;
        let mut j = local_start;
        while j < chars.len() && is_name_char(chars[j]) {
            j += 1;
        }
        let local: String = chars[local_start..j].iter().collect();
        i = j;

        if after_dollar || !prefixes.contains(&prefix) {
            continue;
        }
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        if j < chars.len() && chars[j] == '(' && !found.contains(&local) {
            found.push(local);
        }
    }
}

/// Collects calls from the `{...}` expressions of an attribute value template.
fn scan_avt(value: &str, prefixes: &HashSet<String>, found: &mut Vec<String>) {
    let chars: Vec<char> = value.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '{' {
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'{') {
            i += 2;
            continue;
        }

        let start = i + 1;
        let mut j = start;
        let mut quote: Option<char> = None;
        while j < chars.len() {
            match (quote, chars[j]) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(chars[j]),
                (None, '}') => break,
                _ => {}
            }
            j += 1;
        }
        // An unterminated expression runs to the end of the value.
        let expr: String = chars[start..j.min(chars.len())].iter().collect();
        scan_expression(&expr, prefixes, found);
        i = j + 1;
    }
}

/// A [`DocumentResolver`] that scans every document it loads and registers the calls it
/// finds.
pub struct ScanningResolver {
    inner: Arc<dyn DocumentResolver>,
    registry: Arc<ContextFunctionRegistry>,
    scanned: Mutex<HashSet<String>>,
}

impl ScanningResolver {
    pub fn new(inner: Arc<dyn DocumentResolver>, registry: Arc<ContextFunctionRegistry>) -> Self {
        Self {
            inner,
            registry,
            scanned: Mutex::new(HashSet::new()),
        }
    }

    /// Scans `text` and registers what it calls. Each URI is scanned once; returns the
    /// number of newly registered names.
    pub fn scan(&self, uri: &str, text: &str) -> Result<usize, XsltError> {
        if let Ok(mut scanned) = self.scanned.lock()
            && !scanned.insert(uri.to_string())
        {
            return Ok(0);
        }

        let names = scan_stylesheet(text)?;
        let added = names
            .iter()
            .filter(|name| self.registry.register(name))
            .count();
        log::debug!(
            target: "xdjango::scanner",
            "{}: {} calls, {} new ({})",
            if uri.is_empty() { "<stylesheet>" } else { uri },
            names.len(),
            added,
            names.iter().map(|n| root_name(n)).collect::<Vec<_>>().join(", ")
        );
        Ok(added)
    }
}

impl DocumentResolver for ScanningResolver {
    fn resolve(
        &self,
        href: &str,
        base_uri: Option<&str>,
    ) -> Result<Option<ResolvedDocument>, XsltError> {
        let uri = resolve_uri(href, base_uri);
        if let Some(scheme) = uri_scheme(&uri)
            && DECLINED_SCHEMES.contains(&scheme)
        {
            log::warn!(target: "xdjango::scanner", "Declining '{}': '{}' documents are not scanned", uri, scheme);
            return Ok(None);
        }

        let Some(document) = self.inner.resolve(href, base_uri)? else {
            return Ok(None);
        };
        self.scan(&document.uri, &document.text)?;
        Ok(Some(document))
    }
}
