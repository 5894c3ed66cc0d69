//! A "dumb" XML driver that reads an XSLT source file and notifies a builder object of events.
use super::compiler::StylesheetBuilder;
use super::util::get_owned_attributes;
use crate::error::XsltError;
use quick_xml::Reader;
use quick_xml::events::Event as XmlEvent;

/// Drives the parsing process, calling builder methods for each significant XML event.
///
/// Character data arrives from the reader in pieces (text, entity references, CDATA);
/// adjacent pieces are joined so the builder sees each text run once.
pub fn parse_stylesheet_content(
    source: &str,
    builder: &mut impl StylesheetBuilder,
) -> Result<(), XsltError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut pending_text = String::new();

    loop {
        let pos = reader.buffer_position() as usize;
        let event = reader.read_event_into(&mut buf)?;
        if !matches!(
            event,
            XmlEvent::Text(_) | XmlEvent::CData(_) | XmlEvent::GeneralRef(_)
        ) && !pending_text.is_empty()
        {
            builder.text(std::mem::take(&mut pending_text))?;
        }

        match event {
            XmlEvent::Start(e) => {
                let attributes = get_owned_attributes(&e, reader.decoder())?;
                builder.start_element(e.name().as_ref(), attributes, pos, source)?;
            }
            XmlEvent::Empty(e) => {
                let attributes = get_owned_attributes(&e, reader.decoder())?;
                builder.empty_element(e.name().as_ref(), attributes, pos, source)?;
            }
            XmlEvent::Text(e) => {
                let text = e
                    .decode()
                    .map_err(|e| XsltError::Compilation(e.to_string()))?;
                pending_text.push_str(&text);
            }
            XmlEvent::CData(e) => {
                let text = std::str::from_utf8(e.as_ref())?;
                pending_text.push_str(text);
            }
            XmlEvent::GeneralRef(e) => {
                let name = e
                    .decode()
                    .map_err(|e| XsltError::Compilation(e.to_string()))?;
                pending_text.push(resolve_entity(&name, pos, source)?);
            }
            XmlEvent::End(e) => {
                builder.end_element(e.name().as_ref(), pos, source)?;
            }
            XmlEvent::Eof => break,
            _ => (),
        }
        buf.clear();
    }

    Ok(())
}

fn resolve_entity(name: &str, pos: usize, source: &str) -> Result<char, XsltError> {
    let resolved = match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            code.and_then(char::from_u32)
        }
    };
    resolved.ok_or_else(|| XsltError::TemplateSyntax {
        msg: format!("Unknown entity reference '&{};'", name),
        location: crate::util::get_line_col_from_pos(source, pos).into(),
    })
}
