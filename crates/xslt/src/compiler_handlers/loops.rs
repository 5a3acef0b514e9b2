//! Handlers for `<xsl:for-each>`, `<xsl:apply-templates>` and their `<xsl:sort>` keys.

use crate::ast::{CaseOrder, SortDataType, SortKey, SortOrder, XsltInstruction};
use crate::compiler::{CompilerBuilder, is_xsl};
use crate::error::XsltError;
use crate::util::{XslNode, get_attr_optional, get_attr_required, location_of};

impl CompilerBuilder<'_> {
    fn compile_sort_key(&self, node: XslNode<'_, '_>) -> Result<SortKey, XsltError> {
        let invalid = |what: &str, value: &str| {
            XsltError::structure(format!("Invalid xsl:sort {} '{}'", what, value), location_of(node))
        };
        let order = match get_attr_optional(node, "order") {
            None | Some("ascending") => SortOrder::Ascending,
            Some("descending") => SortOrder::Descending,
            Some(other) => return Err(invalid("order", other)),
        };
        let data_type = match get_attr_optional(node, "data-type") {
            None | Some("text") => SortDataType::Text,
            Some("number") => SortDataType::Number,
            Some(other) if other.contains(':') => {
                log::warn!("Unsupported sort data-type '{}', sorting as text", other);
                SortDataType::Text
            }
            Some(other) => return Err(invalid("data-type", other)),
        };
        let case_order = match get_attr_optional(node, "case-order") {
            None => None,
            Some("upper-first") => Some(CaseOrder::UpperFirst),
            Some("lower-first") => Some(CaseOrder::LowerFirst),
            Some(other) => return Err(invalid("case-order", other)),
        };
        Ok(SortKey {
            select: self.parse_xpath(node, get_attr_optional(node, "select").unwrap_or("."))?,
            order,
            data_type,
            case_order,
        })
    }

    pub(crate) fn compile_for_each(
        &mut self,
        node: XslNode<'_, '_>,
    ) -> Result<XsltInstruction, XsltError> {
        let select = self.parse_xpath(node, get_attr_required(node, "select")?)?;
        let children: Vec<_> = node.children().collect();
        let mut sort_keys = Vec::new();
        let mut start = 0;
        for (i, child) in children.iter().enumerate() {
            if is_xsl(*child, "sort") {
                sort_keys.push(self.compile_sort_key(*child)?);
                start = i + 1;
            } else if child.is_element() || (child.is_text() && !child.text().unwrap_or_default().trim().is_empty()) {
                break;
            }
        }
        Ok(XsltInstruction::ForEach {
            select,
            sort_keys,
            body: self.compile_nodes(&children[start..])?,
        })
    }

    pub(crate) fn compile_apply_templates(
        &mut self,
        node: XslNode<'_, '_>,
    ) -> Result<XsltInstruction, XsltError> {
        let children = Self::significant_children(node);
        self.expect_only(&children, &["sort", "with-param"], node)?;
        let mut sort_keys = Vec::new();
        let mut params = Vec::new();
        for child in children {
            if is_xsl(child, "sort") {
                sort_keys.push(self.compile_sort_key(child)?);
            } else {
                params.push(self.compile_param(child)?);
            }
        }
        Ok(XsltInstruction::ApplyTemplates {
            select: get_attr_optional(node, "select")
                .map(|s| self.parse_xpath(node, s))
                .transpose()?,
            mode: get_attr_optional(node, "mode").map(str::to_string),
            sort_keys,
            params,
        })
    }
}
