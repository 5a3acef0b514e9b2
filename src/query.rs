//! The query façade: a node handle plus the namespaces its XPath
//! expressions may use.

use crate::error::XmlError;
use crate::namespace::NamespaceContext;
use crate::source::XmlSource;
use once_cell::sync::{Lazy, OnceCell};
use std::fmt;
use std::sync::Arc;
use xmlquery_dom::{Node, NodeKind, NodeRef, SerializeOptions};
use xmlquery_xpath1::engine::{KeyIndexes, Variables};
use xmlquery_xpath1::{EvaluationContext, FunctionRegistry, XPathValue, compile, evaluate};

static FUNCTIONS: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::core);

const NODES_HINT: &str = "Did you try to read values instead of nodes? Use .values(xpath)";
const VALUES_HINT: &str = "Did you try to read nodes instead of values? Use .nodes(xpath)";

/// An immutable, queryable XML tree.
///
/// Every node-set query hands back new `XmlQuery` values that carry the
/// same [`NamespaceContext`]. The tree behind a query is never modified, so
/// queries can be cloned and shared across threads freely.
///
/// A *sliced* query re-roots each element returned by [`XmlQuery::nodes`]
/// into a document of its own, so the result can no longer reach its former
/// ancestors or siblings.
#[derive(Clone)]
pub struct XmlQuery {
    node: Node,
    context: Arc<NamespaceContext>,
    text: Arc<OnceCell<String>>,
    sliced: bool,
}

impl XmlQuery {
    /// Parses `source` and binds the well-known namespace prefixes.
    pub fn new<S: XmlSource>(source: S) -> Result<Self, XmlError> {
        Self::from_source(&source, NamespaceContext::default())
    }

    pub fn with_context<S: XmlSource>(source: S, context: NamespaceContext) -> Result<Self, XmlError> {
        Self::from_source(&source, context)
    }

    pub fn from_source(source: &dyn XmlSource, context: NamespaceContext) -> Result<Self, XmlError> {
        Ok(Self::from_node(source.load()?, context))
    }

    /// Wraps an existing node without copying it.
    pub fn from_node(node: Node, context: NamespaceContext) -> Self {
        Self {
            node,
            context: Arc::new(context),
            text: Arc::default(),
            sliced: false,
        }
    }

    /// The same tree, queried as a sliced query.
    pub fn sliced(self) -> Self {
        Self {
            sliced: true,
            ..self
        }
    }

    pub fn is_sliced(&self) -> bool {
        self.sliced
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn context(&self) -> &NamespaceContext {
        &self.context
    }

    /// Selects elements. Any other kind of node in the result is an
    /// [`XmlError::InvalidSelection`]; a non node-set result is an
    /// [`XmlError::InvalidOperation`].
    pub fn nodes(&self, xpath: &str) -> Result<Vec<XmlQuery>, XmlError> {
        let matches = match self.evaluate(xpath, NODES_HINT)? {
            XPathValue::NodeSet(nodes) => nodes,
            other => {
                return Err(XmlError::InvalidOperation {
                    xpath: xpath.to_string(),
                    message: format!("the expression yields a {}. {}", other.type_name(), NODES_HINT),
                });
            }
        };

        let mut result = Vec::with_capacity(matches.len());
        for found in matches {
            match found.kind() {
                NodeKind::Element => {}
                kind @ (NodeKind::Document
                | NodeKind::Attribute
                | NodeKind::Text
                | NodeKind::Comment
                | NodeKind::ProcessingInstruction) => {
                    return Err(XmlError::InvalidSelection {
                        xpath: xpath.to_string(),
                        message: format!(
                            "Only elements are retrievable with nodes(), found {}; use values() for text() nodes, CData sections or attributes",
                            kind_name(kind)
                        ),
                    });
                }
            }
            let handle = self.node.handle_of(found)?;
            let handle = if self.sliced {
                Node::from_document(handle.to_document()?)
            } else {
                handle
            };
            result.push(XmlQuery {
                node: handle,
                context: Arc::clone(&self.context),
                text: Arc::default(),
                sliced: self.sliced,
            });
        }
        log::trace!("nodes('{}') matched {} element(s)", xpath, result.len());
        Ok(result)
    }

    /// Reads text nodes and attribute values, or the string form of a
    /// scalar expression such as `count(//a)`. No match is an empty list.
    pub fn values(&self, xpath: &str) -> Result<Vec<String>, XmlError> {
        let values = match self.evaluate(xpath, VALUES_HINT)? {
            XPathValue::NodeSet(nodes) => {
                let mut values = Vec::with_capacity(nodes.len());
                for found in nodes {
                    match found.kind() {
                        NodeKind::Text | NodeKind::Attribute => values.push(found.value().to_string()),
                        kind @ (NodeKind::Document
                        | NodeKind::Element
                        | NodeKind::Comment
                        | NodeKind::ProcessingInstruction) => {
                            return Err(XmlError::InvalidSelection {
                                xpath: xpath.to_string(),
                                message: format!(
                                    "Only text() nodes, CData sections or attributes are retrievable with values(), found {}; use nodes() to select elements",
                                    kind_name(kind)
                                ),
                            });
                        }
                    }
                }
                values
            }
            scalar => vec![scalar.to_string()],
        };
        log::trace!("values('{}') produced {} value(s)", xpath, values.len());
        Ok(values)
    }

    /// The same tree with `prefix` additionally bound to `uri`.
    pub fn with_namespace(&self, prefix: &str, uri: &str) -> XmlQuery {
        XmlQuery {
            node: self.node.clone(),
            context: Arc::new(self.context.with(prefix, uri)),
            text: Arc::clone(&self.text),
            sliced: self.sliced,
        }
    }

    /// A document node for this query: the tree itself when the query
    /// already sits on a document, otherwise a fresh copy of the element.
    pub fn to_node(&self) -> Result<Node, XmlError> {
        if self.node.is_document() {
            return Ok(self.node.clone());
        }
        Ok(Node::from_document(self.node.to_document()?))
    }

    /// The serialized tree. Documents start with an XML declaration,
    /// elements are written on their own. Computed once.
    pub fn text(&self) -> Result<&str, XmlError> {
        let text = self.text.get_or_try_init(|| {
            let options = if self.node.is_document() {
                SerializeOptions::default()
            } else {
                SerializeOptions::fragment()
            };
            self.node.serialize(&options)
        })?;
        Ok(text.as_str())
    }

    fn evaluate<'q>(&'q self, xpath: &str, hint: &str) -> Result<XPathValue<NodeRef<'q>>, XmlError> {
        let expr = compile(xpath, self.context.as_ref(), &FUNCTIONS)
            .map_err(|e| XmlError::from_xpath(xpath, e, hint))?;
        let variables: Variables<NodeRef<'q>> = Variables::new();
        let keys: KeyIndexes<NodeRef<'q>> = KeyIndexes::new();
        let e_ctx = EvaluationContext::new(self.node.as_ref(), &FUNCTIONS, &variables, &keys, false);
        evaluate(&expr, &e_ctx).map_err(|e| XmlError::from_xpath(xpath, e, hint))
    }
}

fn kind_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Document => "the document node",
        NodeKind::Element => "an element",
        NodeKind::Attribute => "an attribute",
        NodeKind::Text => "a text node",
        NodeKind::Comment => "a comment",
        NodeKind::ProcessingInstruction => "a processing instruction",
    }
}

impl fmt::Display for XmlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text().map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for XmlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlQuery")
            .field("node", &self.node)
            .field("context", &self.context.to_string())
            .field("sliced", &self.sliced)
            .finish()
    }
}

/// Queries are equal when their serialized text is identical.
impl PartialEq for XmlQuery {
    fn eq(&self, other: &Self) -> bool {
        match (self.text(), other.text()) {
            (Ok(left), Ok(right)) => left == right,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_cached_across_namespace_registration() {
        let query = XmlQuery::new("<a><b/></a>").unwrap();
        let first = query.text().unwrap().as_ptr();
        let extended = query.with_namespace("p", "urn:p");
        assert_eq!(extended.text().unwrap().as_ptr(), first);
    }

    #[test]
    fn test_document_text_has_declaration() {
        let query = XmlQuery::new("<a><b>1</b></a>").unwrap();
        assert_eq!(
            query.text().unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><a><b>1</b></a>"
        );
        let child = &query.nodes("/a/b").unwrap()[0];
        assert_eq!(child.text().unwrap(), "<b>1</b>");
    }

    #[test]
    fn test_scalar_nodes_is_invalid_operation() {
        let query = XmlQuery::new("<a/>").unwrap();
        let err = query.nodes("count(/a)").unwrap_err();
        match err {
            XmlError::InvalidOperation { message, .. } => assert!(message.contains(".values(xpath)")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_path_over_number_is_invalid_operation() {
        let query = XmlQuery::new("<a/>").unwrap();
        let err = query.values("count(/a)/b").unwrap_err();
        assert!(matches!(err, XmlError::InvalidOperation { .. }));
    }

    #[test]
    fn test_unknown_function_is_invalid_xpath() {
        let query = XmlQuery::new("<a/>").unwrap();
        assert!(matches!(query.values("nope(1)"), Err(XmlError::InvalidXPath { .. })));
        assert!(matches!(query.nodes("/a["), Err(XmlError::InvalidXPath { .. })));
    }

    #[test]
    fn test_non_sliced_results_reach_parents() {
        let query = XmlQuery::new("<r><a id=\"1\"/><a id=\"2\"/></r>").unwrap();
        let second = &query.nodes("/r/a").unwrap()[1];
        assert_eq!(second.values("../a/@id").unwrap(), vec!["1", "2"]);
        assert!(!second.node().is_document());
        assert!(second.to_node().unwrap().is_document());
    }
}
