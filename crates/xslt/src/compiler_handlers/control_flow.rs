//! Control flow instruction handlers: xsl:if and xsl:choose/when/otherwise.

use crate::ast::{PreparsedTemplate, When, XsltInstruction};
use crate::compiler::{BuilderState, CompilerBuilder};
use crate::error::XsltError;
use crate::util::get_attr_required;

impl CompilerBuilder {
    pub(crate) fn handle_if_end(
        &mut self,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::InstructionBody(attrs) = current_state {
            let test_str = get_attr_required(&attrs, b"test", b"xsl:if", pos, source)?;
            let instr = XsltInstruction::If {
                test: self.parse_xpath(&test_str)?,
                body: PreparsedTemplate(body),
            };
            self.push_instruction(instr);
        }
        Ok(())
    }

    pub(crate) fn handle_when_end(
        &mut self,
        current_state: BuilderState,
        body: Vec<XsltInstruction>,
        pos: usize,
        source: &str,
    ) -> Result<(), XsltError> {
        if let BuilderState::When(attrs) = current_state {
            let test_str = get_attr_required(&attrs, b"test", b"xsl:when", pos, source)?;
            let when = When {
                test: self.parse_xpath(&test_str)?,
                body: PreparsedTemplate(body),
            };
            if let Some(BuilderState::Choose { whens, .. }) = self.state_stack.last_mut() {
                whens.push(when);
            }
        }
        Ok(())
    }

    pub(crate) fn handle_otherwise_end(&mut self, body: Vec<XsltInstruction>) {
        if let Some(BuilderState::Choose { otherwise, .. }) = self.state_stack.last_mut() {
            *otherwise = Some(PreparsedTemplate(body));
        }
    }

    pub(crate) fn handle_choose_end(&mut self, current_state: BuilderState) {
        if let BuilderState::Choose { whens, otherwise } = current_state {
            self.push_instruction(XsltInstruction::Choose { whens, otherwise });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::XsltInstruction;
    use crate::compiler::compile_document;
    use crate::extension::FunctionNamespaces;

    #[test]
    fn test_choose_collects_whens_and_otherwise() {
        let sheet = compile_document(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                 <xsl:template match="/">
                   <xsl:choose>
                     <xsl:when test="1 = 2">a</xsl:when>
                     <xsl:when test="true()">b</xsl:when>
                     <xsl:otherwise>c</xsl:otherwise>
                   </xsl:choose>
                 </xsl:template>
               </xsl:stylesheet>"#,
            FunctionNamespaces::new(),
        )
        .unwrap();
        let body = &sheet.template_rules[&None][0].body.0;
        let XsltInstruction::Choose { whens, otherwise } = &body[0] else {
            panic!("expected xsl:choose, got {:?}", body);
        };
        assert_eq!(whens.len(), 2);
        assert_eq!(whens[1].test.source, "true()");
        assert!(otherwise.is_some());
    }
}
