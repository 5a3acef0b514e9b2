//! Top-level declarations: templates, globals, `xsl:output`, whitespace
//! handling, keys and attribute sets.

use crate::ast::{AttributeSet, KeyDefinition, OutputMethod, SpaceRule, SpaceTest};
use crate::compiler::{CompilerBuilder, XSLT_NAMESPACE, is_xsl};
use crate::error::XsltError;
use crate::pattern::Pattern;
use crate::util::{
    XslNode, display_name, get_attr_optional, get_attr_required, get_attr_yes_no, location_of,
    split_qname, tokens,
};
use xmlquery_xpath1::NoNamespaces;

impl CompilerBuilder<'_> {
    pub(crate) fn compile_declarations(&mut self, root: XslNode<'_, '_>) -> Result<(), XsltError> {
        let mut seen_declaration = false;
        for child in root.children() {
            if child.is_text() {
                if !child.text().unwrap_or_default().trim().is_empty() {
                    return Err(XsltError::structure(
                        "Text is not allowed at the top level of a stylesheet",
                        location_of(child),
                    ));
                }
                continue;
            }
            if !child.is_element() {
                continue;
            }
            match child.tag_name().namespace() {
                Some(XSLT_NAMESPACE) => {}
                Some(_) => {
                    log::debug!("Ignoring top-level data element '{}'", display_name(child));
                    continue;
                }
                None => {
                    return Err(XsltError::structure(
                        format!("Top-level element '{}' must be in a namespace", display_name(child)),
                        location_of(child),
                    ));
                }
            }
            match child.tag_name().name() {
                "import" => {
                    if seen_declaration {
                        return Err(XsltError::structure(
                            "xsl:import must come before all other declarations",
                            location_of(child),
                        ));
                    }
                }
                "include" => seen_declaration = true,
                other => {
                    seen_declaration = true;
                    match other {
                        "template" => self.compile_template(child)?,
                        "variable" => self.compile_global(child, false)?,
                        "param" => self.compile_global(child, true)?,
                        "output" => self.compile_output(child)?,
                        "strip-space" => self.compile_space(child, true)?,
                        "preserve-space" => self.compile_space(child, false)?,
                        "key" => self.compile_key(child)?,
                        "attribute-set" => self.compile_attribute_set(child)?,
                        "decimal-format" | "namespace-alias" => {
                            log::warn!("{} is not supported and is ignored", display_name(child));
                        }
                        _ => {
                            return Err(XsltError::structure(
                                format!("Unknown top-level element '{}'", display_name(child)),
                                location_of(child),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// A literal result element as the whole stylesheet is the body of a
    /// template matching the root.
    pub(crate) fn compile_simplified(&mut self, root: XslNode<'_, '_>) -> Result<(), XsltError> {
        let body = crate::ast::PreparsedTemplate(vec![self.compile_literal_result_element(root)?]);
        let index = self.add_template(None, Vec::new(), body);
        let pattern = Pattern::compile("/", &NoNamespaces, &self.functions)?;
        let rule = crate::ast::TemplateRule {
            priority: pattern.default_priority(),
            pattern,
            import_precedence: self.precedence,
            position: self.next_position(),
            mode: None,
            template: index,
        };
        self.stylesheet.template_rules.entry(None).or_default().push(rule);
        Ok(())
    }

    /// Later `xsl:output` declarations override earlier ones attribute by
    /// attribute; modules are compiled in ascending import precedence.
    fn compile_output(&mut self, node: XslNode<'_, '_>) -> Result<(), XsltError> {
        let output = &mut self.stylesheet.output;
        if let Some(method) = get_attr_optional(node, "method") {
            output.method = match method {
                "xml" => OutputMethod::Xml,
                "html" => OutputMethod::Html,
                "text" => OutputMethod::Text,
                other if other.contains(':') => {
                    log::warn!("Unsupported output method '{}', using xml", other);
                    OutputMethod::Xml
                }
                other => {
                    return Err(XsltError::structure(
                        format!("Invalid output method '{}'", other),
                        location_of(node),
                    ));
                }
            };
        }
        if node.attribute("omit-xml-declaration").is_some() {
            output.omit_xml_declaration = get_attr_yes_no(node, "omit-xml-declaration")?;
        }
        if node.attribute("indent").is_some() {
            output.indent = get_attr_yes_no(node, "indent")?;
        }
        if let Some(encoding) = get_attr_optional(node, "encoding") {
            output.encoding = Some(encoding.to_string());
        }
        for qname in tokens(get_attr_optional(node, "cdata-section-elements")) {
            let (prefix, local) = split_qname(&qname);
            let namespace = node.lookup_namespace_uri(prefix).map(str::to_string);
            output
                .cdata_section_elements
                .push((namespace, local.to_string()));
        }
        Ok(())
    }

    fn compile_space(&mut self, node: XslNode<'_, '_>, strip: bool) -> Result<(), XsltError> {
        for token in tokens(Some(get_attr_required(node, "elements")?)) {
            let test = match split_qname(&token) {
                (None, "*") => SpaceTest::Any,
                (Some(prefix), local) => {
                    let namespace = node.lookup_namespace_uri(Some(prefix)).ok_or_else(|| {
                        XsltError::structure(
                            format!("Prefix '{}' is not declared", prefix),
                            location_of(node),
                        )
                    })?;
                    if local == "*" {
                        SpaceTest::AnyInNamespace(Some(namespace.to_string()))
                    } else {
                        SpaceTest::Name {
                            namespace: Some(namespace.to_string()),
                            local: local.to_string(),
                        }
                    }
                }
                (None, local) => SpaceTest::Name {
                    namespace: None,
                    local: local.to_string(),
                },
            };
            self.stylesheet.space_rules.push(SpaceRule {
                test,
                strip,
                import_precedence: self.precedence,
            });
        }
        Ok(())
    }

    fn compile_key(&mut self, node: XslNode<'_, '_>) -> Result<(), XsltError> {
        let key = KeyDefinition {
            name: get_attr_required(node, "name")?.to_string(),
            pattern: self.parse_pattern(node, get_attr_required(node, "match")?)?,
            use_expr: self.parse_xpath(node, get_attr_required(node, "use")?)?,
        };
        self.stylesheet.keys.push(key);
        Ok(())
    }

    fn compile_attribute_set(&mut self, node: XslNode<'_, '_>) -> Result<(), XsltError> {
        let name = get_attr_required(node, "name")?.to_string();
        let children = Self::significant_children(node);
        self.expect_only(&children, &["attribute"], node)?;
        let mut attributes = Vec::new();
        for child in children.into_iter().filter(|c| is_xsl(*c, "attribute")) {
            attributes.push(self.compile_attribute(child)?);
        }
        let use_attribute_sets = tokens(get_attr_optional(node, "use-attribute-sets"));
        let set = self
            .stylesheet
            .attribute_sets
            .entry(name)
            .or_insert_with(|| AttributeSet {
                attributes: Vec::new(),
                use_attribute_sets: Vec::new(),
            });
        set.attributes.extend(attributes);
        set.use_attribute_sets.extend(use_attribute_sets);
        Ok(())
    }
}
