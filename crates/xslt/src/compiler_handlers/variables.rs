//! Handlers for `<xsl:variable>`, `<xsl:param>`, and `<xsl:with-param>`.

use crate::ast::{GlobalVariable, Param, VariableValue, XsltInstruction};
use crate::compiler::CompilerBuilder;
use crate::error::XsltError;
use crate::util::{XslNode, display_name, get_attr_optional, get_attr_required, is_qname, location_of};

impl CompilerBuilder<'_> {
    fn compile_variable_value(&mut self, node: XslNode<'_, '_>) -> Result<VariableValue, XsltError> {
        let has_content = !Self::significant_children(node).is_empty();
        match get_attr_optional(node, "select") {
            Some(_) if has_content => Err(XsltError::structure(
                format!("{} may have a select attribute or content, not both", display_name(node)),
                location_of(node),
            )),
            Some(select) => Ok(VariableValue::Select(self.parse_xpath(node, select)?)),
            None if has_content => Ok(VariableValue::Content(self.compile_sequence(node)?)),
            None => Ok(VariableValue::Empty),
        }
    }

    fn variable_name(node: XslNode<'_, '_>) -> Result<String, XsltError> {
        let name = get_attr_required(node, "name")?;
        if !is_qname(name) {
            return Err(XsltError::structure(
                format!("'{}' is not a valid variable name", name),
                location_of(node),
            ));
        }
        Ok(name.to_string())
    }

    /// A template parameter declaration or an `xsl:with-param`.
    pub(crate) fn compile_param(&mut self, node: XslNode<'_, '_>) -> Result<Param, XsltError> {
        Ok(Param {
            name: Self::variable_name(node)?,
            value: self.compile_variable_value(node)?,
        })
    }

    pub(crate) fn compile_variable(
        &mut self,
        node: XslNode<'_, '_>,
    ) -> Result<XsltInstruction, XsltError> {
        Ok(XsltInstruction::Variable {
            name: Self::variable_name(node)?,
            value: self.compile_variable_value(node)?,
        })
    }

    pub(crate) fn compile_global(
        &mut self,
        node: XslNode<'_, '_>,
        is_param: bool,
    ) -> Result<(), XsltError> {
        let global = GlobalVariable {
            name: Self::variable_name(node)?,
            value: self.compile_variable_value(node)?,
            is_param,
            import_precedence: self.precedence,
        };
        if let Some(existing) = self
            .stylesheet
            .globals
            .iter()
            .find(|g| g.name == global.name && g.import_precedence == self.precedence)
        {
            return Err(XsltError::structure(
                format!("Global variable '{}' is declared twice", existing.name),
                location_of(node),
            ));
        }
        self.stylesheet.globals.push(global);
        Ok(())
    }
}
