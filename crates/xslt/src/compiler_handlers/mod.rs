pub(super) mod control_flow;
pub(super) mod loops;
pub(super) mod stylesheet;
pub(super) mod template;
pub(super) mod variables;

use crate::ast::{NumberInstruction, NumberLevel, PreparsedTemplate, XsltInstruction};
use crate::compiler::{CompilerBuilder, XSLT_NAMESPACE, is_xsl};
use crate::error::XsltError;
use crate::util::{
    XslNode, display_name, element_prefix, get_attr_optional, get_attr_required, get_attr_yes_no,
    in_scope_namespaces, location_of, prefix_for, preserves_space, tokens,
};
use xmlquery_dom::Name;

fn is_xml_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

// Shared instruction handlers. Declarations live in `stylesheet.rs`.

impl CompilerBuilder<'_> {
    /// Compiles the children of `parent` as a sequence constructor.
    pub(crate) fn compile_sequence(
        &mut self,
        parent: XslNode<'_, '_>,
    ) -> Result<PreparsedTemplate, XsltError> {
        let children: Vec<_> = parent.children().collect();
        self.compile_nodes(&children)
    }

    pub(crate) fn compile_nodes(
        &mut self,
        nodes: &[XslNode<'_, '_>],
    ) -> Result<PreparsedTemplate, XsltError> {
        let mut body = Vec::new();
        for &node in nodes {
            if node.is_text() {
                let text = node.text().unwrap_or_default();
                if !is_xml_whitespace(text) || preserves_space(node) {
                    body.push(XsltInstruction::Text(text.to_string()));
                }
            } else if node.is_element() {
                if node.tag_name().namespace() == Some(XSLT_NAMESPACE) {
                    if let Some(instruction) = self.compile_instruction(node)? {
                        body.push(instruction);
                    }
                } else {
                    body.push(self.compile_literal_result_element(node)?);
                }
            }
        }
        Ok(PreparsedTemplate(body))
    }

    /// Children of `parent` with whitespace-only text removed.
    pub(crate) fn significant_children<'d, 'i>(parent: XslNode<'d, 'i>) -> Vec<XslNode<'d, 'i>> {
        parent
            .children()
            .filter(|n| n.is_element() || (n.is_text() && !is_xml_whitespace(n.text().unwrap_or_default())))
            .collect()
    }

    fn compile_instruction(
        &mut self,
        node: XslNode<'_, '_>,
    ) -> Result<Option<XsltInstruction>, XsltError> {
        let instruction = match node.tag_name().name() {
            "text" => self.compile_text(node)?,
            "value-of" => XsltInstruction::ValueOf {
                select: self.parse_xpath(node, get_attr_required(node, "select")?)?,
            },
            "copy-of" => XsltInstruction::CopyOf {
                select: self.parse_xpath(node, get_attr_required(node, "select")?)?,
            },
            "element" => self.compile_element(node)?,
            "attribute" => self.compile_attribute(node)?,
            "comment" => XsltInstruction::Comment {
                body: self.compile_sequence(node)?,
            },
            "processing-instruction" => XsltInstruction::ProcessingInstruction {
                name: self.parse_avt(node, get_attr_required(node, "name")?)?,
                body: self.compile_sequence(node)?,
            },
            "copy" => XsltInstruction::Copy {
                use_attribute_sets: tokens(get_attr_optional(node, "use-attribute-sets")),
                body: self.compile_sequence(node)?,
            },
            "message" => XsltInstruction::Message {
                terminate: get_attr_yes_no(node, "terminate")?,
                body: self.compile_sequence(node)?,
            },
            "number" => self.compile_number(node)?,
            "if" => self.compile_if(node)?,
            "choose" => self.compile_choose(node)?,
            "for-each" => self.compile_for_each(node)?,
            "apply-templates" => self.compile_apply_templates(node)?,
            "apply-imports" => XsltInstruction::ApplyImports,
            "call-template" => self.compile_call_template(node)?,
            "variable" => self.compile_variable(node)?,
            "fallback" => return Ok(None),
            "param" => {
                return Err(XsltError::structure(
                    "xsl:param is only allowed at the start of a template or at the top level",
                    location_of(node),
                ));
            }
            "sort" | "with-param" | "when" | "otherwise" => {
                return Err(XsltError::structure(
                    format!("{} is not allowed here", display_name(node)),
                    location_of(node),
                ));
            }
            _ => {
                return Err(XsltError::structure(
                    format!("Unknown XSLT instruction '{}'", display_name(node)),
                    location_of(node),
                ));
            }
        };
        Ok(Some(instruction))
    }

    fn compile_text(&mut self, node: XslNode<'_, '_>) -> Result<XsltInstruction, XsltError> {
        if node.children().any(|c| c.is_element()) {
            return Err(XsltError::structure(
                "xsl:text may only contain text",
                location_of(node),
            ));
        }
        if get_attr_yes_no(node, "disable-output-escaping")? {
            log::debug!("disable-output-escaping has no effect on a result tree");
        }
        let text: String = node.children().filter_map(|c| c.text()).collect();
        Ok(XsltInstruction::Text(text))
    }

    pub(crate) fn compile_literal_result_element(
        &mut self,
        node: XslNode<'_, '_>,
    ) -> Result<XsltInstruction, XsltError> {
        let tag = node.tag_name();
        let name = Name::qualified(element_prefix(node).as_deref(), tag.namespace(), tag.name());

        let mut excluded = self.excluded_uris.clone();
        for ancestor in node.ancestors().filter(|n| n.is_element()) {
            if ancestor.tag_name().namespace() != Some(XSLT_NAMESPACE) {
                excluded.extend(self.excluded_namespaces(ancestor, "exclude-result-prefixes")?);
                excluded.extend(self.excluded_namespaces(ancestor, "extension-element-prefixes")?);
            }
        }
        let namespaces = in_scope_namespaces(node)
            .into_iter()
            .filter(|ns| ns.uri != XSLT_NAMESPACE && !excluded.contains(&ns.uri))
            .collect();

        let mut attrs = Vec::new();
        for attr in node.attributes() {
            if attr.namespace() == Some(XSLT_NAMESPACE) {
                continue;
            }
            let prefix = attr.namespace().and_then(|uri| prefix_for(node, uri));
            let attr_name = Name::qualified(prefix.as_deref(), attr.namespace(), attr.name());
            attrs.push((attr_name, self.parse_avt(node, attr.value())?));
        }

        Ok(XsltInstruction::LiteralElement {
            name,
            namespaces,
            attrs,
            use_attribute_sets: tokens(node.attribute((XSLT_NAMESPACE, "use-attribute-sets"))),
            body: self.compile_sequence(node)?,
        })
    }

    fn compile_element(&mut self, node: XslNode<'_, '_>) -> Result<XsltInstruction, XsltError> {
        Ok(XsltInstruction::Element {
            name: self.parse_avt(node, get_attr_required(node, "name")?)?,
            namespace: get_attr_optional(node, "namespace")
                .map(|ns| self.parse_avt(node, ns))
                .transpose()?,
            in_scope: in_scope_namespaces(node),
            use_attribute_sets: tokens(get_attr_optional(node, "use-attribute-sets")),
            body: self.compile_sequence(node)?,
        })
    }

    pub(crate) fn compile_attribute(
        &mut self,
        node: XslNode<'_, '_>,
    ) -> Result<XsltInstruction, XsltError> {
        Ok(XsltInstruction::Attribute {
            name: self.parse_avt(node, get_attr_required(node, "name")?)?,
            namespace: get_attr_optional(node, "namespace")
                .map(|ns| self.parse_avt(node, ns))
                .transpose()?,
            in_scope: in_scope_namespaces(node),
            body: self.compile_sequence(node)?,
        })
    }

    fn compile_number(&mut self, node: XslNode<'_, '_>) -> Result<XsltInstruction, XsltError> {
        let level = match get_attr_optional(node, "level") {
            None | Some("single") => NumberLevel::Single,
            Some("multiple") => NumberLevel::Multiple,
            Some("any") => NumberLevel::Any,
            Some(other) => {
                return Err(XsltError::structure(
                    format!("Invalid xsl:number level '{}'", other),
                    location_of(node),
                ));
            }
        };
        Ok(XsltInstruction::Number(NumberInstruction {
            value: get_attr_optional(node, "value")
                .map(|v| self.parse_xpath(node, v))
                .transpose()?,
            level,
            count: get_attr_optional(node, "count")
                .map(|p| self.parse_pattern(node, p))
                .transpose()?,
            from: get_attr_optional(node, "from")
                .map(|p| self.parse_pattern(node, p))
                .transpose()?,
            format: self.parse_avt(node, get_attr_optional(node, "format").unwrap_or("1"))?,
        }))
    }

    /// Rejects anything but the listed XSLT elements among `nodes`.
    pub(crate) fn expect_only(
        &self,
        nodes: &[XslNode<'_, '_>],
        allowed: &[&str],
        parent: XslNode<'_, '_>,
    ) -> Result<(), XsltError> {
        match nodes
            .iter()
            .find(|n| !allowed.iter().any(|local| is_xsl(**n, local)))
        {
            Some(bad) => Err(XsltError::structure(
                format!(
                    "{} may not contain {}",
                    display_name(parent),
                    if bad.is_element() {
                        display_name(*bad)
                    } else {
                        "text".to_string()
                    }
                ),
                location_of(*bad),
            )),
            None => Ok(()),
        }
    }
}
