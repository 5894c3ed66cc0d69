//! Handlers for node-list instructions: xsl:for-each, xsl:apply-templates, xsl:sort and
//! xsl:call-template.

use crate::ast::{PreparsedTemplate, SortDataType, SortKey, SortOrder, XsltInstruction};
use crate::compiler::{BuilderState, CompilerBuilder};
use crate::error::XsltError;
use crate::util::{OwnedAttributes, get_attr_optional, get_attr_required, get_line_col_from_pos};

impl CompilerBuilder {
    pub(crate) fn handle_for_each_end(
        &mut self,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::Sortable {
            attrs, sort_keys, ..
        } = current_state
        {
            let select_str = get_attr_required(&attrs, b"select", b"xsl:for-each", pos, source)?;
            let instr = XsltInstruction::ForEach {
                select: self.parse_xpath(&select_str)?,
                sort_keys,
                body: PreparsedTemplate(body),
            };
            self.push_instruction(instr);
        }
        Ok(())
    }

    pub(crate) fn handle_apply_templates_end(
        &mut self,
        current_state: BuilderState,
    ) -> Result<(), XsltError> {
        if let BuilderState::Sortable {
            attrs,
            sort_keys,
            params,
        } = current_state
        {
            let select = get_attr_optional(&attrs, b"select")?
                .map(|s| self.parse_xpath(&s))
                .transpose()?;
            let instr = XsltInstruction::ApplyTemplates {
                select,
                mode: get_attr_optional(&attrs, b"mode")?,
                sort_keys,
                params,
            };
            self.push_instruction(instr);
        }
        Ok(())
    }

    pub(crate) fn handle_sort(
        &mut self,
        current_state: BuilderState,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        let BuilderState::InstructionBody(attrs) = current_state else {
            return Ok(());
        };
        let location = get_line_col_from_pos(source, pos).into();
        let select = get_attr_optional(&attrs, b"select")?.unwrap_or_else(|| ".".to_string());
        let order = match get_attr_optional(&attrs, b"order")?.as_deref() {
            Some("descending") => SortOrder::Descending,
            _ => SortOrder::Ascending,
        };
        let data_type = match get_attr_optional(&attrs, b"data-type")?.as_deref() {
            Some("number") => SortDataType::Number,
            _ => SortDataType::Text,
        };
        let key = SortKey {
            select: self.parse_xpath(&select)?,
            order,
            data_type,
        };

        if let Some(BuilderState::Sortable { sort_keys, .. }) = self.state_stack.last_mut() {
            sort_keys.push(key);
            Ok(())
        } else {
            Err(XsltError::TemplateStructure {
                message: "<xsl:sort> must be a child of <xsl:for-each> or <xsl:apply-templates>."
                    .to_string(),
                location,
            })
        }
    }

    pub(crate) fn handle_call_template_start(
        &mut self,
        attrs: OwnedAttributes,
        pos: usize,
        source: &str,
    ) -> Result<BuilderState, XsltError> {
        let name = get_attr_required(&attrs, b"name", b"xsl:call-template", pos, source)?;
        Ok(BuilderState::CallTemplate {
            name,
            params: Vec::new(),
        })
    }

    pub(crate) fn handle_call_template_end(&mut self, current_state: BuilderState) {
        if let BuilderState::CallTemplate { name, params } = current_state {
            self.push_instruction(XsltInstruction::CallTemplate { name, params });
        }
    }
}
