//! Handlers for top-level XSLT stylesheet elements and simple literal instructions.

use crate::ast::{
    KeyDeclaration, NamedTemplate, PreparsedTemplate, SpaceTest, TemplateRule, XsltInstruction,
};
use crate::compiler::{BuilderState, CompilerBuilder};
use crate::error::XsltError;
use crate::util::{get_attr_optional, get_attr_required, get_line_col_from_pos};
use std::sync::Arc;
use xdjango_xpath1::OutputMethod;

impl CompilerBuilder {
    pub(crate) fn handle_template_end(
        &mut self,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        let BuilderState::Template { attrs, params } = current_state else {
            return Ok(());
        };
        let match_str = get_attr_optional(&attrs, b"match")?;
        let name = get_attr_optional(&attrs, b"name")?;
        let mode = get_attr_optional(&attrs, b"mode")?;
        let priority = get_attr_optional(&attrs, b"priority")?
            .map(|p| {
                p.trim().parse::<f64>().map_err(|_| XsltError::TemplateSyntax {
                    msg: format!("Invalid template priority '{}'", p),
                    location: get_line_col_from_pos(source, pos).into(),
                })
            })
            .transpose()?;

        if match_str.is_none() && name.is_none() {
            return Err(XsltError::TemplateStructure {
                message: "<xsl:template> needs a 'match' or a 'name' attribute".to_string(),
                location: get_line_col_from_pos(source, pos).into(),
            });
        }

        let body = PreparsedTemplate(body);
        if let Some(name) = name {
            self.stylesheet.named_templates.insert(
                name,
                Arc::new(NamedTemplate {
                    params: params.clone(),
                    body: body.clone(),
                }),
            );
        }

        if let Some(match_str) = match_str {
            let pattern = self.parse_pattern(&match_str)?;
            let rules = self.stylesheet.template_rules.entry(mode.clone()).or_default();
            match priority {
                Some(priority) => rules.push(TemplateRule {
                    pattern,
                    priority,
                    mode,
                    params,
                    body,
                }),
                None => {
                    for alternative in pattern.alternatives() {
                        rules.push(TemplateRule {
                            priority: alternative.default_priority(),
                            pattern: alternative,
                            mode: mode.clone(),
                            params: params.clone(),
                            body: body.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn handle_import_or_include(
        &mut self,
        local: &str,
        current_state: BuilderState,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let element: &[u8] = if local == "import" { b"xsl:import" } else { b"xsl:include" };
            let href = get_attr_required(&attrs, b"href", element, pos, source)?;
            if local == "import" {
                self.stylesheet.imports.push(href);
            } else {
                self.stylesheet.includes.push(href);
            }
        }
        Ok(())
    }

    pub(crate) fn handle_output(&mut self, current_state: BuilderState) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            if let Some(method) = get_attr_optional(&attrs, b"method")? {
                match OutputMethod::from_name(&method) {
                    Some(m) => self.stylesheet.output.method = Some(m),
                    None => log::warn!("Unsupported output method '{}', using default", method),
                }
            }
            if let Some(omit) = get_attr_optional(&attrs, b"omit-xml-declaration")? {
                self.stylesheet.output.omit_xml_declaration = omit.trim() == "yes";
            }
            if let Some(encoding) = get_attr_optional(&attrs, b"encoding")? {
                self.stylesheet.output.encoding = encoding;
            }
            if let Some(indent) = get_attr_optional(&attrs, b"indent")? {
                self.stylesheet.output.indent = indent.trim() == "yes";
            }
        }
        Ok(())
    }

    pub(crate) fn handle_key(
        &mut self,
        current_state: BuilderState,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let name = get_attr_required(&attrs, b"name", b"xsl:key", pos, source)?;
            let match_str = get_attr_required(&attrs, b"match", b"xsl:key", pos, source)?;
            let use_str = get_attr_required(&attrs, b"use", b"xsl:key", pos, source)?;
            let decl = KeyDeclaration {
                name: name.clone(),
                pattern: self.parse_pattern(&match_str)?,
                use_expr: self.parse_xpath(&use_str)?,
            };
            self.stylesheet.keys.entry(name).or_default().push(decl);
        }
        Ok(())
    }

    pub(crate) fn handle_space_declaration(
        &mut self,
        local: &str,
        current_state: BuilderState,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let element: &[u8] = if local == "strip-space" {
                b"xsl:strip-space"
            } else {
                b"xsl:preserve-space"
            };
            let elements = get_attr_required(&attrs, b"elements", element, pos, source)?;
            let mut tests = Vec::new();
            for token in elements.split_whitespace() {
                tests.push(match token.split_once(':') {
                    _ if token == "*" => SpaceTest::Any,
                    Some((prefix, "*")) => {
                        let uri = self.lookup_prefix(prefix).ok_or_else(|| {
                            XsltError::TemplateSyntax {
                                msg: format!("Namespace prefix '{}' is not declared", prefix),
                                location: get_line_col_from_pos(source, pos).into(),
                            }
                        })?;
                        SpaceTest::Namespace(uri)
                    }
                    _ => {
                        let name = self.resolve_qname(token, false, pos, source)?;
                        SpaceTest::Name {
                            namespace: name.namespace,
                            local: name.local_part,
                        }
                    }
                });
            }
            if local == "strip-space" {
                self.stylesheet.strip_space.extend(tests);
            } else {
                self.stylesheet.preserve_space.extend(tests);
            }
        }
        Ok(())
    }

    pub(crate) fn handle_text_end(&mut self, body: Vec<XsltInstruction>) -> Result<(), XsltError> {
        if let Some(parent) = self.instruction_stack.last_mut() {
            parent.extend(body);
        }
        Ok(())
    }

    // --- Handlers for simple, empty instructions ---

    pub(crate) fn handle_value_of(
        &mut self,
        current_state: BuilderState,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let select_str = get_attr_required(&attrs, b"select", b"xsl:value-of", pos, source)?;
            let instr = XsltInstruction::ValueOf {
                select: self.parse_xpath(&select_str)?,
            };
            self.push_instruction(instr);
        }
        Ok(())
    }

    pub(crate) fn handle_copy_of(
        &mut self,
        current_state: BuilderState,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let select_str = get_attr_required(&attrs, b"select", b"xsl:copy-of", pos, source)?;
            let instr = XsltInstruction::CopyOf {
                select: self.parse_xpath(&select_str)?,
            };
            self.push_instruction(instr);
        }
        Ok(())
    }

    pub(crate) fn handle_message_end(
        &mut self,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let terminate = get_attr_optional(&attrs, b"terminate")?
                .is_some_and(|t| t.trim() == "yes");
            self.push_instruction(XsltInstruction::Message {
                body: PreparsedTemplate(body),
                terminate,
            });
        }
        Ok(())
    }
}
