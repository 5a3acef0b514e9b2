use crate::builder::DocumentBuilder;
use crate::document::{Document, NodeId, NodeKind, NodeRef};
use crate::error::DomError;
use crate::serialize::{SerializeOptions, serialize};
use std::fmt;
use std::sync::Arc;

/// An owned handle to a node: a shared document plus a position in it.
/// Cloning is cheap and the handle can cross threads.
#[derive(Clone)]
pub struct Node {
    doc: Arc<Document>,
    id: NodeId,
}

impl Node {
    pub(crate) fn new(doc: Arc<Document>, id: NodeId) -> Self {
        Self { doc, id }
    }

    /// An owned handle on `node`, which must belong to this handle's document.
    pub fn handle_of(&self, node: NodeRef<'_>) -> Result<Node, DomError> {
        if !std::ptr::eq(node.document(), Arc::as_ptr(&self.doc)) {
            return Err(DomError::Builder(
                "node belongs to a different document".to_string(),
            ));
        }
        Ok(Self::new(Arc::clone(&self.doc), node.id()))
    }

    /// A handle on the document node.
    pub fn from_document(doc: Arc<Document>) -> Self {
        Self::new(doc, NodeId::ROOT)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    pub fn as_ref(&self) -> NodeRef<'_> {
        self.doc.node(self.id)
    }

    pub fn kind(&self) -> NodeKind {
        self.as_ref().kind()
    }

    pub fn is_document(&self) -> bool {
        self.id == NodeId::ROOT
    }

    pub fn string_value(&self) -> String {
        self.as_ref().text_content()
    }

    /// The document this node is the root of; for any other node, a fresh
    /// document holding a deep copy of it. In-scope namespaces are carried
    /// onto the copied element.
    pub fn to_document(&self) -> Result<Arc<Document>, DomError> {
        if self.is_document() {
            return Ok(Arc::clone(&self.doc));
        }
        let mut builder = DocumentBuilder::new();
        builder.copy_node(self.as_ref())?;
        Ok(Arc::new(builder.finish()?))
    }

    pub fn serialize(&self, options: &SerializeOptions) -> Result<String, DomError> {
        serialize(self.as_ref(), options)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.doc, &other.doc) && self.id == other.id
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_ref(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use xmlquery_xpath1::DataSourceNode;

    #[test]
    fn test_handle_of_rejects_foreign_nodes() {
        let doc = Arc::new(parse("<r><x/></r>").unwrap());
        let other = Arc::new(parse("<r><x/><y/><z/></r>").unwrap());
        let root = Node::from_document(Arc::clone(&doc));

        let x = doc.document_element().unwrap();
        let handle = root.handle_of(x).unwrap();
        assert_eq!(handle.id(), x.id());
        assert!(Arc::ptr_eq(handle.document(), &doc));

        let z = other.document_element().unwrap().child_nodes().last().unwrap();
        assert!(matches!(root.handle_of(z), Err(DomError::Builder(_))));
    }

    #[test]
    fn test_to_document_reroots_with_namespaces() {
        let doc = Arc::new(parse("<r xmlns:a=\"urn:a\"><a:x><y>1</y></a:x></r>").unwrap());
        let x = doc.document_element().unwrap().child_nodes().next().unwrap();
        let handle = Node::new(Arc::clone(&doc), x.id());
        let copy = handle.to_document().unwrap();
        assert!(!Arc::ptr_eq(&copy, &doc));
        let root = copy.document_element().unwrap();
        assert_eq!(root.node_name().unwrap().lexical(), "a:x");
        assert_eq!(root.lookup_namespace(Some("a")).as_deref(), Some("urn:a"));
        assert_eq!(root.parent().map(|p| p.is_document()), Some(true));
        assert_eq!(root.string_value(), "1");
    }

    #[test]
    fn test_document_handle_is_shared() {
        let doc = Arc::new(parse("<r/>").unwrap());
        let handle = Node::from_document(Arc::clone(&doc));
        assert!(Arc::ptr_eq(&handle.to_document().unwrap(), &doc));
        assert_eq!(handle, Node::from_document(doc));
    }
}
