//! Handlers for `<xsl:template>` and `<xsl:call-template>`.

use crate::ast::{TemplateRule, XsltInstruction};
use crate::compiler::{CompilerBuilder, is_xsl};
use crate::error::XsltError;
use crate::util::{XslNode, get_attr_optional, get_attr_required, location_of};

impl CompilerBuilder<'_> {
    pub(crate) fn compile_template(&mut self, node: XslNode<'_, '_>) -> Result<(), XsltError> {
        let pattern = get_attr_optional(node, "match")
            .map(|m| self.parse_pattern(node, m))
            .transpose()?;
        let name = get_attr_optional(node, "name").map(str::to_string);
        if pattern.is_none() && name.is_none() {
            return Err(XsltError::structure(
                "xsl:template needs a match or a name attribute",
                location_of(node),
            ));
        }
        let priority = match get_attr_optional(node, "priority") {
            Some(p) => Some(p.trim().parse::<f64>().map_err(|_| {
                XsltError::structure(format!("Invalid template priority '{}'", p), location_of(node))
            })?),
            None => None,
        };
        let mode = get_attr_optional(node, "mode").map(str::to_string);
        if pattern.is_none() && (mode.is_some() || priority.is_some()) {
            log::warn!("mode and priority are ignored on a template without a match pattern");
        }

        let children: Vec<_> = node.children().collect();
        let mut params = Vec::new();
        let mut start = 0;
        for (i, child) in children.iter().enumerate() {
            if is_xsl(*child, "param") {
                params.push(self.compile_param(*child)?);
                start = i + 1;
            } else if child.is_element() || (child.is_text() && !child.text().unwrap_or_default().trim().is_empty()) {
                break;
            }
        }
        let body = self.compile_nodes(&children[start..])?;
        let index = self.add_template(name, params, body);

        if let Some(pattern) = pattern {
            for alternative in pattern.alternatives() {
                let rule = TemplateRule {
                    priority: priority.unwrap_or_else(|| alternative.default_priority()),
                    pattern: alternative,
                    import_precedence: self.precedence,
                    position: self.next_position(),
                    mode: mode.clone(),
                    template: index,
                };
                self.stylesheet
                    .template_rules
                    .entry(mode.clone())
                    .or_default()
                    .push(rule);
            }
        }
        Ok(())
    }

    pub(crate) fn compile_call_template(
        &mut self,
        node: XslNode<'_, '_>,
    ) -> Result<XsltInstruction, XsltError> {
        let name = get_attr_required(node, "name")?.to_string();
        let children = Self::significant_children(node);
        self.expect_only(&children, &["with-param"], node)?;
        let params = children
            .into_iter()
            .map(|child| self.compile_param(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(XsltInstruction::CallTemplate { name, params })
    }
}
