//! Incremental construction of a [`Document`], used by the parser, by subtree
//! copies and by the XSLT result tree writer.
//!
//! Namespace declarations are fixed up as nodes arrive: a name whose namespace
//! is not bound to its prefix gets a declaration, and prefix clashes are
//! resolved by generating a fresh `nsN` prefix.

use crate::document::{Document, Name, Namespace, NodeData, NodeId, NodeKind, NodeRef};
use crate::error::DomError;
use xmlquery_xpath1::XML_NAMESPACE;

#[derive(Debug)]
pub struct DocumentBuilder {
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
    generated: usize,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Document, None)],
            open: vec![NodeId::ROOT],
            generated: 0,
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(NodeId::ROOT)
    }

    /// Nesting depth of open elements; zero at the document level.
    pub fn depth(&self) -> usize {
        self.open.len() - 1
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    /// The URI bound to `prefix` as seen from `at`. `Some("")` means the
    /// default namespace was undeclared.
    fn lookup(&self, at: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        let mut current = Some(at);
        while let Some(id) = current {
            let data = &self.nodes[id.0];
            if let Some(ns) = data
                .namespaces
                .iter()
                .find(|ns| ns.prefix.as_deref() == prefix)
            {
                return Some(ns.uri.as_str());
            }
            current = data.parent;
        }
        None
    }

    fn prefix_for(&self, at: NodeId, uri: &str) -> Option<String> {
        let mut current = Some(at);
        while let Some(id) = current {
            let data = &self.nodes[id.0];
            for ns in &data.namespaces {
                if let Some(prefix) = &ns.prefix {
                    if ns.uri == uri && self.lookup(at, Some(prefix)) == Some(uri) {
                        return Some(prefix.clone());
                    }
                }
            }
            current = data.parent;
        }
        None
    }

    fn declares(&self, element: NodeId, prefix: Option<&str>) -> bool {
        self.nodes[element.0]
            .namespaces
            .iter()
            .any(|ns| ns.prefix.as_deref() == prefix)
    }

    fn fresh_prefix(&mut self, element: NodeId) -> String {
        loop {
            let candidate = format!("ns{}", self.generated);
            self.generated += 1;
            if self.lookup(element, Some(&candidate)).is_none() {
                return candidate;
            }
        }
    }

    /// Opens an element. `declared` are the namespace declarations written on
    /// it; those already in scope with the same URI are dropped.
    pub fn start_element(&mut self, name: Name, declared: &[Namespace]) -> Result<(), DomError> {
        let parent = self.current();
        if name.local.is_empty() {
            return Err(DomError::Builder("element name must not be empty".into()));
        }
        let mut data = NodeData::new(NodeKind::Element, Some(parent));
        for ns in declared {
            if ns.prefix.as_deref() == Some("xml") || ns.prefix.as_deref() == Some("xmlns") {
                continue;
            }
            if data
                .namespaces
                .iter()
                .any(|existing| existing.prefix == ns.prefix)
            {
                continue;
            }
            let inherited = self.lookup(parent, ns.prefix.as_deref()).unwrap_or("");
            if inherited != ns.uri {
                data.namespaces.push(ns.clone());
            }
        }
        let id = self.push(data);
        self.nodes[parent.0].children.push(id);
        self.open.push(id);

        let name = self.fix_element_name(id, name);
        self.nodes[id.0].name = Some(name);
        Ok(())
    }

    fn fix_element_name(&mut self, id: NodeId, mut name: Name) -> Name {
        match name.namespace.clone() {
            Some(uri) => {
                if self.lookup(id, name.prefix.as_deref()) == Some(uri.as_str()) {
                    return name;
                }
                if !self.declares(id, name.prefix.as_deref()) {
                    self.nodes[id.0]
                        .namespaces
                        .push(Namespace::new(name.prefix.as_deref(), &uri));
                    return name;
                }
                let prefix = match self.prefix_for(id, &uri) {
                    Some(prefix) => prefix,
                    None => {
                        let prefix = self.fresh_prefix(id);
                        self.nodes[id.0]
                            .namespaces
                            .push(Namespace::new(Some(&prefix), &uri));
                        prefix
                    }
                };
                log::debug!(
                    "Renamed prefix of element '{}' to '{}' to avoid a namespace clash",
                    name,
                    prefix
                );
                name.prefix = Some(prefix);
                name
            }
            None => {
                name.prefix = None;
                let default = self.lookup(id, None).unwrap_or("");
                if !default.is_empty() {
                    let declarations = &mut self.nodes[id.0].namespaces;
                    declarations.retain(|ns| ns.prefix.is_some());
                    if self.lookup(id, None).is_some_and(|uri| !uri.is_empty()) {
                        self.nodes[id.0].namespaces.push(Namespace::new(None, ""));
                    }
                }
                name
            }
        }
    }

    fn open_element(&self, what: &str) -> Result<NodeId, DomError> {
        let id = self.current();
        if id == NodeId::ROOT {
            return Err(DomError::Builder(format!(
                "cannot add {} outside of an element",
                what
            )));
        }
        Ok(id)
    }

    /// Adds an attribute to the open element. An attribute with the same
    /// expanded name replaces the earlier value.
    pub fn attribute(&mut self, name: Name, value: &str) -> Result<(), DomError> {
        let element = self.open_element("an attribute")?;
        if !self.nodes[element.0].children.is_empty() {
            return Err(DomError::Builder(format!(
                "attribute '{}' added after child nodes",
                name
            )));
        }
        let name = self.fix_attribute_name(element, name);
        let existing = self.nodes[element.0].attributes.iter().copied().find(|id| {
            self.nodes[id.0]
                .name
                .as_ref()
                .is_some_and(|n| n.same_expanded(&name))
        });
        match existing {
            Some(id) => self.nodes[id.0].value = value.to_string(),
            None => {
                let mut data = NodeData::new(NodeKind::Attribute, Some(element));
                data.name = Some(name);
                data.value = value.to_string();
                let id = self.push(data);
                self.nodes[element.0].attributes.push(id);
            }
        }
        Ok(())
    }

    fn fix_attribute_name(&mut self, element: NodeId, mut name: Name) -> Name {
        let Some(uri) = name.namespace.clone() else {
            name.prefix = None;
            return name;
        };
        if let Some(prefix) = name.prefix.as_deref() {
            if self.lookup(element, Some(prefix)) == Some(uri.as_str()) {
                return name;
            }
            if !self.declares(element, Some(prefix)) {
                self.nodes[element.0]
                    .namespaces
                    .push(Namespace::new(Some(prefix), &uri));
                return name;
            }
        }
        let prefix = match self.prefix_for(element, &uri) {
            Some(prefix) => prefix,
            None => {
                let prefix = self.fresh_prefix(element);
                self.nodes[element.0]
                    .namespaces
                    .push(Namespace::new(Some(&prefix), &uri));
                prefix
            }
        };
        name.prefix = Some(prefix);
        name
    }

    /// Appends character data, merging with a preceding text node.
    pub fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if self.nodes[last.0].kind == NodeKind::Text {
                self.nodes[last.0].value.push_str(text);
                return;
            }
        }
        let mut data = NodeData::new(NodeKind::Text, Some(parent));
        data.value = text.to_string();
        let id = self.push(data);
        self.nodes[parent.0].children.push(id);
    }

    pub fn comment(&mut self, text: &str) {
        let parent = self.current();
        let mut data = NodeData::new(NodeKind::Comment, Some(parent));
        data.value = text.to_string();
        let id = self.push(data);
        self.nodes[parent.0].children.push(id);
    }

    pub fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), DomError> {
        if target.is_empty() || target.eq_ignore_ascii_case("xml") {
            return Err(DomError::Builder(format!(
                "invalid processing instruction target '{}'",
                target
            )));
        }
        let parent = self.current();
        let mut node = NodeData::new(NodeKind::ProcessingInstruction, Some(parent));
        node.name = Some(Name::local(target));
        node.value = data.to_string();
        let id = self.push(node);
        self.nodes[parent.0].children.push(id);
        Ok(())
    }

    pub fn end_element(&mut self) -> Result<(), DomError> {
        self.open_element("an end tag")?;
        self.open.pop();
        Ok(())
    }

    /// Deep-copies `node` into the current position. An element brings along
    /// its attributes and, when it becomes the outermost element of the new
    /// tree, every namespace in scope at its original position. A document
    /// node copies its children.
    pub fn copy_node(&mut self, node: NodeRef<'_>) -> Result<(), DomError> {
        match node.kind() {
            NodeKind::Document => {
                for child in node.child_nodes() {
                    self.copy_node(child)?;
                }
            }
            NodeKind::Element => {
                let declared = if self.depth() == 0 {
                    node.in_scope_namespaces()
                } else {
                    node.declared_namespaces().to_vec()
                };
                let name = node
                    .node_name()
                    .cloned()
                    .ok_or_else(|| DomError::Builder("element without a name".into()))?;
                self.start_element(name, &declared)?;
                for attr in node.attribute_nodes() {
                    self.copy_node(attr)?;
                }
                for child in node.child_nodes() {
                    self.copy_node(child)?;
                }
                self.end_element()?;
            }
            NodeKind::Attribute => {
                if let Some(name) = node.node_name() {
                    self.attribute(name.clone(), node.value())?;
                }
            }
            NodeKind::Text => self.text(node.value()),
            NodeKind::Comment => self.comment(node.value()),
            NodeKind::ProcessingInstruction => {
                let target = node.node_name().map(|n| n.local.as_str()).unwrap_or("");
                self.processing_instruction(target, node.value())?;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Result<Document, DomError> {
        if self.open.len() > 1 {
            return Err(DomError::Builder(format!(
                "{} element(s) left open",
                self.open.len() - 1
            )));
        }
        Ok(Document::from_nodes(self.nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns_name(prefix: Option<&str>, uri: &str, local: &str) -> Name {
        Name::qualified(prefix, Some(uri), local)
    }

    #[test]
    fn test_declares_missing_namespaces() {
        let mut b = DocumentBuilder::new();
        b.start_element(ns_name(Some("a"), "urn:a", "root"), &[])
            .unwrap();
        b.start_element(ns_name(Some("a"), "urn:a", "child"), &[])
            .unwrap();
        b.end_element().unwrap();
        b.end_element().unwrap();
        let doc = b.finish().unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(root.declared_namespaces(), &[Namespace::new(Some("a"), "urn:a")]);
        let child = root.child_nodes().next().unwrap();
        assert!(child.declared_namespaces().is_empty());
    }

    #[test]
    fn test_undeclares_default_namespace_for_unqualified_child() {
        let mut b = DocumentBuilder::new();
        b.start_element(ns_name(None, "urn:d", "root"), &[]).unwrap();
        b.start_element(Name::local("plain"), &[]).unwrap();
        b.end_element().unwrap();
        b.end_element().unwrap();
        let doc = b.finish().unwrap();
        let plain = doc.document_element().unwrap().child_nodes().next().unwrap();
        assert_eq!(plain.declared_namespaces(), &[Namespace::new(None, "")]);
        assert_eq!(plain.lookup_namespace(None), None);
    }

    #[test]
    fn test_generates_prefix_for_clashing_attribute() {
        let mut b = DocumentBuilder::new();
        b.start_element(ns_name(Some("p"), "urn:one", "root"), &[])
            .unwrap();
        b.attribute(ns_name(Some("p"), "urn:two", "att"), "v").unwrap();
        b.attribute(ns_name(None, "urn:three", "other"), "w").unwrap();
        b.end_element().unwrap();
        let doc = b.finish().unwrap();
        let root = doc.document_element().unwrap();
        let names: Vec<String> = root
            .attribute_nodes()
            .map(|a| a.node_name().unwrap().lexical())
            .collect();
        assert_eq!(names, vec!["ns0:att", "ns1:other"]);
        assert_eq!(root.attribute(Some("urn:two"), "att"), Some("v"));
        assert_eq!(root.lookup_namespace(Some("ns1")).as_deref(), Some("urn:three"));
    }

    #[test]
    fn test_attribute_replaces_and_rejects_late_attributes() {
        let mut b = DocumentBuilder::new();
        b.start_element(Name::local("e"), &[]).unwrap();
        b.attribute(Name::local("x"), "1").unwrap();
        b.attribute(Name::local("x"), "2").unwrap();
        b.text("a");
        b.text("b");
        assert!(b.attribute(Name::local("y"), "3").is_err());
        b.end_element().unwrap();
        let doc = b.finish().unwrap();
        let e = doc.document_element().unwrap();
        assert_eq!(e.attribute_nodes().count(), 1);
        assert_eq!(e.attribute(None, "x"), Some("2"));
        assert_eq!(e.child_nodes().count(), 1);
        assert_eq!(e.text_content(), "ab");
    }

    #[test]
    fn test_unbalanced_builders_fail() {
        let mut b = DocumentBuilder::new();
        assert!(b.end_element().is_err());
        b.start_element(Name::local("open"), &[]).unwrap();
        assert!(b.finish().is_err());
    }
}
