//! Handlers for `<xsl:if>` and `<xsl:choose>`.

use crate::ast::{When, XsltInstruction};
use crate::compiler::{CompilerBuilder, is_xsl};
use crate::error::XsltError;
use crate::util::{XslNode, get_attr_required, location_of};

impl CompilerBuilder<'_> {
    pub(crate) fn compile_if(&mut self, node: XslNode<'_, '_>) -> Result<XsltInstruction, XsltError> {
        Ok(XsltInstruction::If {
            test: self.parse_xpath(node, get_attr_required(node, "test")?)?,
            body: self.compile_sequence(node)?,
        })
    }

    pub(crate) fn compile_choose(
        &mut self,
        node: XslNode<'_, '_>,
    ) -> Result<XsltInstruction, XsltError> {
        let children = Self::significant_children(node);
        self.expect_only(&children, &["when", "otherwise"], node)?;

        let mut whens = Vec::new();
        let mut otherwise = None;
        for child in children {
            if otherwise.is_some() {
                return Err(XsltError::structure(
                    "xsl:otherwise must be the last child of xsl:choose",
                    location_of(child),
                ));
            }
            if is_xsl(child, "when") {
                whens.push(When {
                    test: self.parse_xpath(child, get_attr_required(child, "test")?)?,
                    body: self.compile_sequence(child)?,
                });
            } else {
                otherwise = Some(self.compile_sequence(child)?);
            }
        }
        if whens.is_empty() {
            return Err(XsltError::structure(
                "xsl:choose needs at least one xsl:when",
                location_of(node),
            ));
        }
        Ok(XsltInstruction::Choose { whens, otherwise })
    }
}
