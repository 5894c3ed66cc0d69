//! Handlers for `<xsl:variable>`, `<xsl:param>`, and `<xsl:with-param>`.

use crate::ast::{BindingValue, GlobalBinding, Param, PreparsedTemplate, WithParam, XsltInstruction};
use crate::compiler::{BuilderState, CompilerBuilder};
use crate::error::XsltError;
use crate::util::{get_attr_optional, get_attr_required, get_line_col_from_pos};

impl CompilerBuilder {
    pub(crate) fn handle_binding_end(
        &mut self,
        local: &str,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        let BuilderState::Binding(attrs) = current_state else {
            return Ok(());
        };
        let location = get_line_col_from_pos(source, pos).into();
        let element = format!("xsl:{}", local);

        let name = get_attr_required(&attrs, b"name", element.as_bytes(), pos, source)?;
        let value = match get_attr_optional(&attrs, b"select")? {
            Some(select) => BindingValue::Select(self.parse_xpath(&select)?),
            None if !body.is_empty() => BindingValue::Content(PreparsedTemplate(body)),
            None => BindingValue::Empty,
        };

        match (local, self.state_stack.last_mut()) {
            ("param" | "variable", Some(BuilderState::Stylesheet)) => {
                self.stylesheet.globals.push(GlobalBinding {
                    name,
                    value,
                    is_param: local == "param",
                });
                Ok(())
            }
            ("param", Some(BuilderState::Template { params, .. })) => {
                params.push(Param { name, value });
                Ok(())
            }
            ("param", _) => Err(XsltError::TemplateStructure {
                message: "<xsl:param> can only appear at the top level of a stylesheet or a template."
                    .to_string(),
                location,
            }),
            ("variable", _) => {
                self.push_instruction(XsltInstruction::Variable { name, value });
                Ok(())
            }
            (
                _,
                Some(
                    BuilderState::CallTemplate { params, .. } | BuilderState::Sortable { params, .. },
                ),
            ) => {
                params.push(WithParam { name, value });
                Ok(())
            }
            _ => Err(XsltError::TemplateStructure {
                message: "<xsl:with-param> must be a direct child of <xsl:call-template> or <xsl:apply-templates>."
                    .to_string(),
                location,
            }),
        }
    }
}
