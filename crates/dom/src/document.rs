//! The arena tree every query and transformation runs against.
//!
//! Node ids are handed out in document order (an element, then its
//! attributes, then its children), so comparing ids compares document
//! positions.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use xmlquery_xpath1::{DataSourceNode, NodeType, QName, XML_NAMESPACE};

/// Index of a node inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// The closed set of node kinds. CDATA sections are read as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// An expanded name together with the prefix it was written with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub local: String,
}

impl Name {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            namespace: None,
            local: local.into(),
        }
    }

    pub fn qualified(
        prefix: Option<&str>,
        namespace: Option<&str>,
        local: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
            namespace: namespace.filter(|n| !n.is_empty()).map(str::to_string),
            local: local.into(),
        }
    }

    /// `prefix:local`, or just `local` without a prefix.
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }

    /// True when both names share namespace and local part.
    pub fn same_expanded(&self, other: &Name) -> bool {
        self.local == other.local && self.namespace == other.namespace
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical())
    }
}

/// A namespace declaration. `prefix: None` is the default namespace; an empty
/// `uri` undeclares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
}

impl Namespace {
    pub fn new(prefix: Option<&str>, uri: &str) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
            uri: uri.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    /// Element and attribute names; the target of a processing instruction.
    pub(crate) name: Option<Name>,
    /// Text, comment, attribute value or processing instruction data.
    pub(crate) value: String,
    pub(crate) attributes: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Declarations made on this element.
    pub(crate) namespaces: Vec<Namespace>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            name: None,
            value: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            namespaces: Vec::new(),
        }
    }
}

/// An immutable parsed or built XML tree. Share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) nodes: Vec<NodeData>,
}

impl Document {
    pub(crate) fn from_nodes(nodes: Vec<NodeData>) -> Self {
        Self { nodes }
    }

    /// The document node.
    pub fn root(&self) -> NodeRef<'_> {
        self.node(NodeId::ROOT)
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { doc: self, id }
    }

    /// The single top-level element, if the document has one.
    pub fn document_element(&self) -> Option<NodeRef<'_>> {
        self.root()
            .child_nodes()
            .find(|n| n.kind() == NodeKind::Element)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document_element().is_none()
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }
}

/// A borrowed position in a [`Document`]; the node type the XPath engine walks.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    fn data(&self) -> &'a NodeData {
        self.doc.data(self.id)
    }

    pub fn node_name(&self) -> Option<&'a Name> {
        self.data().name.as_ref()
    }

    /// The raw value of a text, comment, attribute or processing instruction node.
    pub fn value(&self) -> &'a str {
        &self.data().value
    }

    pub fn parent_node(&self) -> Option<NodeRef<'a>> {
        self.data().parent.map(|id| self.doc.node(id))
    }

    pub fn child_nodes(&self) -> impl DoubleEndedIterator<Item = NodeRef<'a>> + 'a {
        let doc = self.doc;
        self.data().children.iter().map(move |&id| doc.node(id))
    }

    pub fn attribute_nodes(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let doc = self.doc;
        self.data().attributes.iter().map(move |&id| doc.node(id))
    }

    /// The value of the attribute with the given namespace and local name.
    pub fn attribute(&self, namespace: Option<&str>, local: &str) -> Option<&'a str> {
        self.attribute_nodes()
            .find(|a| {
                a.node_name()
                    .is_some_and(|n| n.local == local && n.namespace.as_deref() == namespace)
            })
            .map(|a| a.value())
    }

    /// Namespace declarations written on this element.
    pub fn declared_namespaces(&self) -> &'a [Namespace] {
        &self.data().namespaces
    }

    /// Every binding visible at this node, nearest declaration first per
    /// prefix. Undeclared default namespaces are dropped.
    pub fn in_scope_namespaces(&self) -> Vec<Namespace> {
        let mut seen: Vec<Option<&str>> = Vec::new();
        let mut result = Vec::new();
        let mut current = Some(*self);
        while let Some(node) = current {
            for ns in node.declared_namespaces() {
                if seen.contains(&ns.prefix.as_deref()) {
                    continue;
                }
                seen.push(ns.prefix.as_deref());
                if !ns.uri.is_empty() {
                    result.push(ns.clone());
                }
            }
            current = node.parent_node();
        }
        result
    }

    /// Resolves a prefix (`None` for the default namespace) at this node.
    pub fn lookup_namespace(&self, prefix: Option<&str>) -> Option<String> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE.to_string());
        }
        let mut current = Some(*self);
        while let Some(node) = current {
            if let Some(ns) = node
                .declared_namespaces()
                .iter()
                .find(|ns| ns.prefix.as_deref() == prefix)
            {
                return (!ns.uri.is_empty()).then(|| ns.uri.clone());
            }
            current = node.parent_node();
        }
        None
    }

    pub fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }

    pub fn is_document(&self) -> bool {
        self.kind() == NodeKind::Document
    }

    /// Descendants in document order, excluding attributes and `self`.
    pub fn descendants(&self) -> Vec<NodeRef<'a>> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef<'a>> = self.child_nodes().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.child_nodes().rev());
        }
        out
    }

    /// The XPath string value: concatenated descendant text for documents and
    /// elements, the raw value otherwise.
    pub fn text_content(&self) -> String {
        match self.kind() {
            NodeKind::Document | NodeKind::Element => self
                .descendants()
                .into_iter()
                .filter(|n| n.kind() == NodeKind::Text)
                .map(|n| n.value())
                .collect(),
            NodeKind::Attribute
            | NodeKind::Text
            | NodeKind::Comment
            | NodeKind::ProcessingInstruction => self.value().to_string(),
        }
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node_name() {
            Some(name) => write!(f, "{:?}#{}({})", self.kind(), self.id.0, name),
            None => write!(f, "{:?}#{}", self.kind(), self.id.0),
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl PartialOrd for NodeRef<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeRef<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.doc as *const Document as usize;
        let b = other.doc as *const Document as usize;
        a.cmp(&b).then(self.id.cmp(&other.id))
    }
}

impl Hash for NodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.doc as *const Document as usize).hash(state);
        self.id.hash(state);
    }
}

impl<'a> DataSourceNode<'a> for NodeRef<'a> {
    fn node_type(&self) -> NodeType {
        match self.kind() {
            NodeKind::Document => NodeType::Root,
            NodeKind::Element => NodeType::Element,
            NodeKind::Attribute => NodeType::Attribute,
            NodeKind::Text => NodeType::Text,
            NodeKind::Comment => NodeType::Comment,
            NodeKind::ProcessingInstruction => NodeType::ProcessingInstruction,
        }
    }

    fn name(&self) -> Option<QName<'a>> {
        self.node_name().map(|n| QName {
            prefix: n.prefix.as_deref(),
            namespace: n.namespace.as_deref(),
            local_part: n.local.as_str(),
        })
    }

    fn string_value(&self) -> String {
        self.text_content()
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        Box::new(self.attribute_nodes())
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        Box::new(self.child_nodes())
    }

    fn parent(&self) -> Option<Self> {
        self.parent_node()
    }

    fn namespaces_in_scope(&self) -> Vec<(Option<&'a str>, &'a str)> {
        if !self.is_element() {
            return Vec::new();
        }
        let mut seen: Vec<Option<&'a str>> = Vec::new();
        let mut bindings = Vec::new();
        let mut current = Some(*self);
        while let Some(node) = current {
            for ns in node.declared_namespaces() {
                let prefix = ns.prefix.as_deref();
                if seen.contains(&prefix) {
                    continue;
                }
                seen.push(prefix);
                if !ns.uri.is_empty() {
                    bindings.push((prefix, ns.uri.as_str()));
                }
            }
            current = node.parent_node();
        }
        bindings
    }
}
