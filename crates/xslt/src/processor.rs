//! The public face of the crate: compile once, transform many times.

use crate::ast::{CompiledStylesheet, OutputDeclaration, OutputMethod};
use crate::compiler;
use crate::error::XsltError;
use crate::executor::{ExecutionConfig, TemplateExecutor};
use crate::output::TreeBuilder;
use std::sync::Arc;
use xmlquery_dom::{
    Document, DocumentBuilder, DomError, Node, NodeKind, NodeRef, SerializeOptions, serialize,
};
use xmlquery_traits::UriResolver;
use xmlquery_xpath1::engine::Variables;
use xmlquery_xpath1::{XML_NAMESPACE, XPathValue};

/// A value bound to a top-level `xsl:param`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Number(f64),
    Boolean(bool),
    /// A node, seen by the stylesheet as a node-set of one.
    Node(Node),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Boolean(value)
    }
}

impl From<Node> for ParamValue {
    fn from(value: Node) -> Self {
        ParamValue::Node(value)
    }
}

/// A compiled stylesheet, cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct XsltProcessor {
    stylesheet: Arc<CompiledStylesheet>,
}

impl XsltProcessor {
    /// Compiles `source`, loading imports and includes through `resolver`.
    pub fn compile(
        source: &str,
        base_uri: Option<&str>,
        resolver: &dyn UriResolver,
    ) -> Result<Self, XsltError> {
        let stylesheet = compiler::compile(source, base_uri, resolver)?;
        log::debug!(
            "Compiled stylesheet with {} template(s) across {} module(s)",
            stylesheet.templates.len(),
            stylesheet.precedence_levels
        );
        Ok(Self {
            stylesheet: Arc::new(stylesheet),
        })
    }

    pub fn stylesheet(&self) -> &CompiledStylesheet {
        &self.stylesheet
    }

    pub fn output(&self) -> &OutputDeclaration {
        &self.stylesheet.output
    }

    /// Runs the stylesheet with `source` as the input tree. A node other
    /// than a document root is first copied into a document of its own.
    pub fn transform(
        &self,
        source: &Node,
        params: &[(String, ParamValue)],
        config: ExecutionConfig,
    ) -> Result<TransformResult, XsltError> {
        let input = source.to_document()?;
        let stripped;
        let root = if self.stylesheet.strips_whitespace() {
            stripped = strip_whitespace(input.root(), &self.stylesheet)?;
            stripped.root()
        } else {
            input.root()
        };

        let mut bound: Variables<NodeRef<'_>> = Variables::new();
        for (name, value) in params {
            let value = match value {
                ParamValue::String(s) => XPathValue::String(s.clone()),
                ParamValue::Number(n) => XPathValue::Number(*n),
                ParamValue::Boolean(b) => XPathValue::Boolean(*b),
                ParamValue::Node(node) => XPathValue::NodeSet(vec![node.as_ref()]),
            };
            bound.insert(name.clone(), value);
        }

        let mut builder = TreeBuilder::new();
        let mut executor = TemplateExecutor::new(&self.stylesheet, root, config);
        executor.initialize(bound)?;
        executor.execute(&mut builder)?;
        let document = builder.finish()?;
        log::debug!("Transformation produced {} result node(s)", document.len());

        Ok(TransformResult {
            document: Arc::new(document),
            output: self.stylesheet.output.clone(),
        })
    }
}

/// The result tree of a transformation and the output settings to render it.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub document: Arc<Document>,
    pub output: OutputDeclaration,
}

impl TransformResult {
    pub fn node(&self) -> Node {
        Node::from_document(Arc::clone(&self.document))
    }

    /// Renders the result as `xsl:output` asks: the string value for the
    /// text method, serialized markup otherwise.
    pub fn to_text(&self) -> Result<String, DomError> {
        match self.output.method {
            OutputMethod::Text => Ok(self.document.root().text_content()),
            OutputMethod::Xml | OutputMethod::Html => {
                let options = SerializeOptions {
                    declaration: self.output.method == OutputMethod::Xml
                        && !self.output.omit_xml_declaration,
                    indent: self.output.indent,
                    cdata_elements: self.output.cdata_section_elements.clone(),
                };
                serialize(self.document.root(), &options)
            }
        }
    }
}

/// Copies the tree rooted at `root`, dropping whitespace-only text children
/// of elements that `xsl:strip-space` covers, unless `xml:space="preserve"`
/// is in effect.
fn strip_whitespace(root: NodeRef<'_>, stylesheet: &CompiledStylesheet) -> Result<Document, DomError> {
    let mut builder = DocumentBuilder::new();
    for child in root.child_nodes() {
        copy_stripped(&mut builder, child, stylesheet, false)?;
    }
    builder.finish()
}

fn copy_stripped(
    builder: &mut DocumentBuilder,
    node: NodeRef<'_>,
    stylesheet: &CompiledStylesheet,
    inherited_preserve: bool,
) -> Result<(), DomError> {
    if node.kind() != NodeKind::Element {
        return builder.copy_node(node);
    }
    let Some(name) = node.node_name() else {
        return Ok(());
    };
    let preserve = match node.attribute(Some(XML_NAMESPACE), "space") {
        Some("preserve") => true,
        Some("default") => false,
        _ => inherited_preserve,
    };
    let strip = !preserve && stylesheet.should_strip(name.namespace.as_deref(), &name.local);

    builder.start_element(name.clone(), node.declared_namespaces())?;
    for attr in node.attribute_nodes() {
        builder.copy_node(attr)?;
    }
    for child in node.child_nodes() {
        if strip
            && child.kind() == NodeKind::Text
            && child.value().chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
        {
            continue;
        }
        copy_stripped(builder, child, stylesheet, preserve)?;
    }
    builder.end_element()
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmlquery_dom::parse;
    use xmlquery_traits::EmptyResolver;

    fn compile(xsl: &str) -> XsltProcessor {
        XsltProcessor::compile(xsl, None, &EmptyResolver).unwrap()
    }

    fn source(xml: &str) -> Node {
        Node::from_document(Arc::new(parse(xml).unwrap()))
    }

    #[test]
    fn test_strip_space_removes_whitespace_text() {
        let xsl = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:strip-space elements="list"/>
            <xsl:output method="text"/>
            <xsl:template match="/"><xsl:value-of select="count(/list/node())"/></xsl:template>
        </xsl:stylesheet>"#;
        let result = compile(xsl)
            .transform(&source("<list>\n  <a/>\n  <b/>\n</list>"), &[], ExecutionConfig::default())
            .unwrap();
        assert_eq!(result.to_text().unwrap(), "2");
    }

    #[test]
    fn test_xml_space_preserve_wins_over_strip() {
        let xsl = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:strip-space elements="*"/>
            <xsl:output method="text"/>
            <xsl:template match="/"><xsl:value-of select="count(//text())"/></xsl:template>
        </xsl:stylesheet>"#;
        let xml = r#"<r><p xml:space="preserve"> </p><q> </q></r>"#;
        let result = compile(xsl)
            .transform(&source(xml), &[], ExecutionConfig::default())
            .unwrap();
        assert_eq!(result.to_text().unwrap(), "1");
    }

    #[test]
    fn test_xml_output_has_declaration_unless_omitted() {
        let with = compile(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                <xsl:template match="/"><done/></xsl:template>
            </xsl:stylesheet>"#,
        );
        let text = with
            .transform(&source("<x/>"), &[], ExecutionConfig::default())
            .unwrap()
            .to_text()
            .unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.ends_with("<done/>"));

        let without = compile(
            r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
                <xsl:output omit-xml-declaration="yes"/>
                <xsl:template match="/"><done/></xsl:template>
            </xsl:stylesheet>"#,
        );
        let text = without
            .transform(&source("<x/>"), &[], ExecutionConfig::default())
            .unwrap()
            .to_text()
            .unwrap();
        assert_eq!(text, "<done/>");
    }

    #[test]
    fn test_node_param_is_a_node_set() {
        let xsl = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:param name="other"/>
            <xsl:output method="text"/>
            <xsl:template match="/"><xsl:value-of select="$other/item/@id"/></xsl:template>
        </xsl:stylesheet>"#;
        let other = source(r#"<item id="42"/>"#);
        let result = compile(xsl)
            .transform(
                &source("<x/>"),
                &[("other".to_string(), ParamValue::Node(other))],
                ExecutionConfig::default(),
            )
            .unwrap();
        assert_eq!(result.to_text().unwrap(), "42");
    }
}
