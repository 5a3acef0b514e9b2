//! Defines the core abstraction for a navigable, read-only node tree.
use std::hash::Hash;

/// A qualified name, consisting of an optional prefix, the namespace it is bound
/// to, and a local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub namespace: Option<&'a str>,
    pub local_part: &'a str,
}

impl<'a> QName<'a> {
    pub fn local(local_part: &'a str) -> Self {
        Self {
            prefix: None,
            namespace: None,
            local_part,
        }
    }
}

/// The type of a node in the tree, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// The contract for a node in a read-only, hierarchical tree.
///
/// The XPath engine and the XSLT executor are written exclusively against this
/// trait. `Ord` must follow document order, with an element ordered before its
/// attributes and its attributes before its children.
///
/// `'a` is the lifetime of the underlying tree.
pub trait DataSourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    /// The type of the node (Element, Text, Attribute, etc.).
    fn node_type(&self) -> NodeType;

    /// The qualified name of the node. Returns `None` for node types that do not
    /// have names, such as text or root nodes. For a processing instruction this
    /// is its target.
    fn name(&self) -> Option<QName<'a>>;

    /// The string value of the node, as defined by the XPath 1.0 `string()` function.
    /// - For a text node, this is its content.
    /// - For an element or the root, the concatenated descendant text.
    /// - For an attribute, this is its value.
    /// - For a comment or processing instruction, this is its content.
    fn string_value(&self) -> String;

    /// An iterator over the attribute nodes of this node.
    /// The iterator will be empty for non-element nodes.
    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// An iterator over the child nodes of this node.
    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// The parent node. For an attribute this is its owning element.
    fn parent(&self) -> Option<Self>;

    /// The namespace bindings in scope on an element, as `(prefix, uri)`
    /// pairs with `None` for the default namespace. Trees that do not track
    /// declarations report none.
    fn namespaces_in_scope(&self) -> Vec<(Option<&'a str>, &'a str)> {
        Vec::new()
    }
}
