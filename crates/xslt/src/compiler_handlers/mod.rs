pub(super) mod control_flow;
pub(super) mod loops;
pub(super) mod stylesheet;
pub(super) mod variables;

use super::compiler::{BuilderState, CompilerBuilder};
use super::util::{OwnedAttributes, get_attr_optional, get_attr_required, parse_avt};
use crate::ast::{ExtensionInstruction, PreparsedTemplate, XsltInstruction};
use crate::error::XsltError;
use std::str::from_utf8;
use xdjango_xpath1::QName;

// These are handlers for result-tree construction and extension elements.
// They are implemented as methods on CompilerBuilder.

impl CompilerBuilder {
    pub(crate) fn handle_literal_result_element_end(
        &mut self,
        name: QName,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::LiteralResult(attrs) = current_state {
            let mut compiled_attrs = Vec::with_capacity(attrs.len());
            for (key, value) in &attrs {
                let attr_name = self.resolve_qname(from_utf8(key)?, false, pos, source)?;
                compiled_attrs.push((attr_name, parse_avt(self, from_utf8(value)?)?));
            }
            let instr = XsltInstruction::LiteralElement {
                name,
                namespaces: self.literal_namespaces(),
                attrs: compiled_attrs,
                body: PreparsedTemplate(body),
            };
            self.push_instruction(instr);
        }
        Ok(())
    }

    pub(crate) fn handle_element_end(
        &mut self,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let name_avt_str = get_attr_required(&attrs, b"name", b"xsl:element", pos, source)?;
            let instr = XsltInstruction::Element {
                name: parse_avt(self, &name_avt_str)?,
                namespace: get_attr_optional(&attrs, b"namespace")?
                    .map(|ns| parse_avt(self, &ns))
                    .transpose()?,
                scope: self.namespaces_with_default(),
                body: PreparsedTemplate(body),
            };
            self.push_instruction(instr);
        }
        Ok(())
    }

    pub(crate) fn handle_attribute_end(
        &mut self,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let attr_name_str = get_attr_required(&attrs, b"name", b"xsl:attribute", pos, source)?;
            let instr = XsltInstruction::Attribute {
                name: parse_avt(self, &attr_name_str)?,
                namespace: get_attr_optional(&attrs, b"namespace")?
                    .map(|ns| parse_avt(self, &ns))
                    .transpose()?,
                scope: self.namespaces(),
                body: PreparsedTemplate(body),
            };
            self.push_instruction(instr);
        }
        Ok(())
    }

    pub(crate) fn handle_copy_end(&mut self, body: Vec<XsltInstruction>) {
        self.push_instruction(XsltInstruction::Copy {
            body: PreparsedTemplate(body),
        });
    }

    pub(crate) fn handle_comment_end(&mut self, body: Vec<XsltInstruction>) {
        self.push_instruction(XsltInstruction::Comment {
            body: PreparsedTemplate(body),
        });
    }

    pub(crate) fn handle_processing_instruction_end(
        &mut self,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let name = get_attr_required(
                &attrs,
                b"name",
                b"xsl:processing-instruction",
                pos,
                source,
            )?;
            let instr = XsltInstruction::ProcessingInstruction {
                name: parse_avt(self, &name)?,
                body: PreparsedTemplate(body),
            };
            self.push_instruction(instr);
        }
        Ok(())
    }

    pub(crate) fn handle_extension_end(
        &mut self,
        name: QName,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
    ) -> Result<(), XsltError> {
        if let BuilderState::Extension { attrs, fallback } = current_state {
            let attributes = extension_attributes(self, &attrs)?;
            let instr = XsltInstruction::Extension(Box::new(ExtensionInstruction {
                name,
                attributes,
                body: PreparsedTemplate(body),
                fallback,
            }));
            self.push_instruction(instr);
        }
        Ok(())
    }

    /// `xsl:fallback` only matters inside an extension element; elsewhere its state is
    /// `Ignored` and the content is dropped.
    pub(crate) fn handle_fallback_end(
        &mut self,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
    ) {
        if let BuilderState::Fallback = current_state
            && let Some(BuilderState::Extension { fallback, .. }) = self.state_stack.last_mut()
        {
            fallback
                .get_or_insert_with(PreparsedTemplate::default)
                .0
                .extend(body);
        }
    }
}

fn extension_attributes(
    builder: &CompilerBuilder,
    attrs: &OwnedAttributes,
) -> Result<Vec<(QName, String)>, XsltError> {
    let mut attributes = Vec::with_capacity(attrs.len());
    for (key, value) in attrs {
        let key = from_utf8(key)?;
        let name = match key.split_once(':') {
            Some((prefix, local)) => {
                let uri = builder.namespaces().get(prefix).cloned();
                QName::namespaced(Some(prefix), local, uri.as_deref())
            }
            None => QName::local(key),
        };
        attributes.push((name, from_utf8(value)?.to_string()));
    }
    Ok(attributes)
}
