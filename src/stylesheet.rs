//! Stylesheet transforms over queries.

use crate::error::XmlError;
use crate::query::XmlQuery;
use once_cell::sync::OnceCell;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use xmlquery_dom::encoding::decode;
use xmlquery_dom::{Node, NodeKind, parse};
use xmlquery_resource::FilesystemResolver;
use xmlquery_traits::{EmptyResolver, UriResolver};
use xmlquery_xslt::{
    ExecutionConfig, OutputMethod, ParamValue, TransformResult, XsltError, XsltProcessor,
};

const STRIP_WHITESPACE: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:output omit-xml-declaration="yes"/>
  <xsl:strip-space elements="*"/>
  <xsl:template match="node()|@*">
    <xsl:copy>
      <xsl:apply-templates select="node()|@*"/>
    </xsl:copy>
  </xsl:template>
</xsl:stylesheet>
"#;

/// An XSLT 1.0 stylesheet with its parameters and import resolver.
///
/// Every setter returns a new value and leaves the receiver alone. The
/// compiled form is built on first use and shared between clones until the
/// resolver changes.
#[derive(Clone)]
pub struct Stylesheet {
    source: Arc<str>,
    base_uri: Option<String>,
    params: Vec<(String, ParamValue)>,
    resolver: Arc<dyn UriResolver>,
    config: ExecutionConfig,
    compiled: Arc<OnceCell<XsltProcessor>>,
}

impl Stylesheet {
    /// A stylesheet whose imports cannot be resolved until
    /// [`Stylesheet::with_resolver`] supplies a resolver.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Arc::from(source.into()),
            base_uri: None,
            params: Vec::new(),
            resolver: Arc::new(EmptyResolver),
            config: ExecutionConfig::default(),
            compiled: Arc::default(),
        }
    }

    /// Decodes stylesheet bytes like a document: byte order mark, then the
    /// declared encoding, then UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XmlError> {
        let text = decode(bytes).map_err(|e| XmlError::Unreadable {
            location: "stylesheet bytes".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(text))
    }

    /// Reads a stylesheet file. Relative imports resolve next to it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, XmlError> {
        let path = path.as_ref();
        let unreadable = |message: String| XmlError::Unreadable {
            location: path.display().to_string(),
            message,
        };
        let bytes = std::fs::read(path).map_err(|e| unreadable(e.to_string()))?;
        let text = decode(&bytes).map_err(|e| unreadable(e.to_string()))?;
        let folder = path.parent().unwrap_or_else(|| Path::new("."));
        let mut stylesheet = Self::new(text).with_resolver(FilesystemResolver::new(folder));
        stylesheet.base_uri = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(stylesheet)
    }

    /// The identity transform that drops whitespace-only text between
    /// elements: `<a>   <b/>  </a>` becomes `<a><b/></a>`.
    pub fn stripped() -> Self {
        Self::new(STRIP_WHITESPACE)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn params(&self) -> &[(String, ParamValue)] {
        &self.params
    }

    /// Binds the global parameter `name`. A later binding of the same name
    /// replaces the earlier one.
    pub fn with_param(&self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let name = name.into();
        let value = value.into();
        let mut params = self.params.clone();
        match params.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => params.push((name, value)),
        }
        Self {
            params,
            ..self.clone()
        }
    }

    /// The same stylesheet loading its imports through `resolver`.
    pub fn with_resolver(&self, resolver: impl UriResolver + 'static) -> Self {
        self.with_shared_resolver(Arc::new(resolver))
    }

    pub fn with_shared_resolver(&self, resolver: Arc<dyn UriResolver>) -> Self {
        log::debug!("Stylesheet resolver set to {}", resolver.name());
        Self {
            resolver,
            compiled: Arc::default(),
            ..self.clone()
        }
    }

    /// In strict mode undeclared variables and parameters are errors.
    pub fn strict(&self, strict: bool) -> Self {
        Self {
            config: ExecutionConfig { strict },
            ..self.clone()
        }
    }

    /// Transforms the tree of `query` into a new query over the result
    /// tree. The result uses the namespaces of `query` and must be a
    /// well-formed document: one document element, no text beside it.
    /// Text output is parsed as XML.
    pub fn transformed(&self, query: &XmlQuery) -> Result<XmlQuery, XmlError> {
        let result = self.run(query)?;
        let transformed = XmlQuery::from_node(self.result_document(&result)?, query.context().clone());
        Ok(if query.is_sliced() {
            transformed.sliced()
        } else {
            transformed
        })
    }

    /// Transforms the tree of `query` and renders the result as the
    /// stylesheet's `xsl:output` asks.
    pub fn transformed_to_text(&self, query: &XmlQuery) -> Result<String, XmlError> {
        let result = self.run(query)?;
        result.to_text().map_err(|e| self.invalid(e))
    }

    fn processor(&self) -> Result<&XsltProcessor, XmlError> {
        self.compiled
            .get_or_try_init(|| {
                XsltProcessor::compile(&self.source, self.base_uri.as_deref(), self.resolver.as_ref())
            })
            .map_err(|e| self.invalid(e))
    }

    fn run(&self, query: &XmlQuery) -> Result<TransformResult, XmlError> {
        let processor = self.processor()?;
        processor
            .transform(query.node(), &self.params, self.config)
            .map_err(|e| self.invalid(e))
    }

    fn result_document(&self, result: &TransformResult) -> Result<Node, XmlError> {
        if result.output.method == OutputMethod::Text {
            let text = result.to_text().map_err(|e| self.invalid(e))?;
            let document = parse(&text)
                .map_err(|e| self.not_a_document(format!("the text output does not parse: {}", e)))?;
            return Ok(Node::from_document(Arc::new(document)));
        }

        let mut elements = 0;
        for child in result.document.root().child_nodes() {
            match child.kind() {
                NodeKind::Element => elements += 1,
                NodeKind::Comment | NodeKind::ProcessingInstruction => {}
                NodeKind::Text if child.value().trim().is_empty() => {}
                NodeKind::Text => {
                    return Err(self.not_a_document(format!(
                        "text '{}' outside the document element",
                        child.value()
                    )));
                }
                kind @ (NodeKind::Document | NodeKind::Attribute) => {
                    return Err(self.not_a_document(format!("{:?} node at the top level", kind)));
                }
            }
        }
        if elements != 1 {
            return Err(self.not_a_document(format!(
                "it has {} top-level elements instead of one",
                elements
            )));
        }
        Ok(result.node())
    }

    fn not_a_document(&self, reason: String) -> XmlError {
        XmlError::InvalidStylesheet {
            message: format!("The transformation result is not a well-formed document: {}", reason),
            stylesheet: self.source.to_string(),
        }
    }

    fn invalid(&self, err: impl Into<XsltError>) -> XmlError {
        XmlError::InvalidStylesheet {
            message: err.into().to_string(),
            stylesheet: self.source.to_string(),
        }
    }
}

/// The stylesheet source.
impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Debug for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stylesheet")
            .field("base_uri", &self.base_uri)
            .field("params", &self.params)
            .field("resolver", &self.resolver.name())
            .field("config", &self.config)
            .field("compiled", &self.compiled.get().is_some())
            .finish()
    }
}

/// A query bound as a parameter is seen by the stylesheet as the node-set
/// holding the query's node.
impl From<&XmlQuery> for ParamValue {
    fn from(query: &XmlQuery) -> Self {
        ParamValue::Node(query.node().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DONE: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
        <xsl:template match="/"><done/></xsl:template>
    </xsl:stylesheet>"#;

    #[test]
    fn test_with_param_does_not_touch_receiver() {
        let base = Stylesheet::new(DONE);
        let bound = base.with_param("a", "1").with_param("a", 2.0);
        assert!(base.params().is_empty());
        assert_eq!(bound.params(), &[("a".to_string(), ParamValue::Number(2.0))]);
    }

    #[test]
    fn test_compiled_form_is_shared_until_resolver_changes() {
        let stylesheet = Stylesheet::new(DONE);
        let query = XmlQuery::new("<a/>").unwrap();
        stylesheet.transformed(&query).unwrap();
        let with_param = stylesheet.with_param("x", "y");
        assert!(with_param.compiled.get().is_some());
        let rebound = stylesheet.with_resolver(EmptyResolver);
        assert!(rebound.compiled.get().is_none());
    }

    #[test]
    fn test_display_is_source() {
        assert_eq!(Stylesheet::new(DONE).to_string(), DONE);
    }

    #[test]
    fn test_broken_stylesheet_carries_source() {
        let broken = "<xsl:stylesheet version=\"1.0\" xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\">";
        let err = Stylesheet::new(broken)
            .transformed(&XmlQuery::new("<a/>").unwrap())
            .unwrap_err();
        match err {
            XmlError::InvalidStylesheet { stylesheet, .. } => assert_eq!(stylesheet, broken),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
