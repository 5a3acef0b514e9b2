//! Writes trees back to text with `quick-xml`.

use crate::document::{Namespace, NodeKind, NodeRef};
use crate::error::DomError;
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};

/// How a tree is written out.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializeOptions {
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>` before a document.
    pub declaration: bool,
    pub indent: bool,
    /// Elements, as `(namespace, local name)`, whose text is written as CDATA.
    pub cdata_elements: Vec<(Option<String>, String)>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            declaration: true,
            indent: false,
            cdata_elements: Vec::new(),
        }
    }
}

impl SerializeOptions {
    /// No declaration, no indentation.
    pub fn fragment() -> Self {
        Self {
            declaration: false,
            ..Self::default()
        }
    }
}

struct Serializer<'o> {
    writer: Writer<Vec<u8>>,
    options: &'o SerializeOptions,
}

/// Serializes `node` and everything below it. The outermost element declares
/// every namespace in scope at its position so the output stands alone.
pub fn serialize(node: NodeRef<'_>, options: &SerializeOptions) -> Result<String, DomError> {
    let writer = if options.indent {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    } else {
        Writer::new(Vec::new())
    };
    let mut serializer = Serializer { writer, options };
    serializer.write_root(node)?;
    String::from_utf8(serializer.writer.into_inner())
        .map_err(|e| DomError::Serialize(e.to_string()))
}

impl Serializer<'_> {
    fn emit(&mut self, event: Event<'_>) -> Result<(), DomError> {
        self.writer
            .write_event(event)
            .map_err(|e| DomError::Serialize(e.to_string()))
    }

    fn write_root(&mut self, node: NodeRef<'_>) -> Result<(), DomError> {
        match node.kind() {
            NodeKind::Document => {
                if self.options.declaration {
                    self.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
                }
                for child in node.child_nodes() {
                    self.write_node(child, false)?;
                }
                Ok(())
            }
            NodeKind::Element => {
                let mut namespaces = node.in_scope_namespaces();
                namespaces.sort_by(|a, b| a.prefix.cmp(&b.prefix));
                self.write_element(node, &namespaces)
            }
            NodeKind::Attribute => {
                self.emit(Event::Text(BytesText::from_escaped(partial_escape(node.value()))))
            }
            _ => self.write_node(node, false),
        }
    }

    fn write_node(&mut self, node: NodeRef<'_>, cdata: bool) -> Result<(), DomError> {
        match node.kind() {
            NodeKind::Element => self.write_element(node, node.declared_namespaces()),
            NodeKind::Text if cdata => self.write_cdata(node.value()),
            NodeKind::Text => {
                self.emit(Event::Text(BytesText::from_escaped(partial_escape(node.value()))))
            }
            NodeKind::Comment => self.emit(Event::Comment(BytesText::from_escaped(node.value()))),
            NodeKind::ProcessingInstruction => {
                let target = node.node_name().map(|n| n.local.as_str()).unwrap_or_default();
                let content = if node.value().is_empty() {
                    target.to_string()
                } else {
                    format!("{} {}", target, node.value())
                };
                self.emit(Event::PI(BytesPI::new(content)))
            }
            NodeKind::Attribute | NodeKind::Document => Ok(()),
        }
    }

    fn write_element(&mut self, node: NodeRef<'_>, namespaces: &[Namespace]) -> Result<(), DomError> {
        let name = node
            .node_name()
            .map(|n| n.lexical())
            .ok_or_else(|| DomError::Serialize("element without a name".into()))?;
        let mut start = BytesStart::new(name.as_str());
        for ns in namespaces {
            let key = match &ns.prefix {
                Some(prefix) => format!("xmlns:{}", prefix),
                None => "xmlns".to_string(),
            };
            start.push_attribute((key.as_str(), ns.uri.as_str()));
        }
        for attr in node.attribute_nodes() {
            if let Some(attr_name) = attr.node_name() {
                start.push_attribute((attr_name.lexical().as_str(), attr.value()));
            }
        }
        if node.child_nodes().next().is_none() {
            return self.emit(Event::Empty(start));
        }
        self.emit(Event::Start(start))?;
        let cdata = self.is_cdata_element(node);
        for child in node.child_nodes() {
            self.write_node(child, cdata)?;
        }
        self.emit(Event::End(BytesEnd::new(name.as_str())))
    }

    fn is_cdata_element(&self, node: NodeRef<'_>) -> bool {
        node.node_name().is_some_and(|name| {
            self.options
                .cdata_elements
                .iter()
                .any(|(ns, local)| *local == name.local && *ns == name.namespace)
        })
    }

    /// CDATA cannot contain `]]>`, so that sequence is split across sections.
    fn write_cdata(&mut self, text: &str) -> Result<(), DomError> {
        let mut rest = text;
        while let Some(pos) = rest.find("]]>") {
            let (head, tail) = rest.split_at(pos + 2);
            self.emit(Event::CData(BytesCData::new(head)))?;
            rest = tail;
        }
        self.emit(Event::CData(BytesCData::new(rest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn test_document_round_trip() {
        let text = "<r a=\"x &amp; &lt;y&gt;\"><!--c--><?pi go?>a &lt; b<e/></r>";
        let doc = parse(text).unwrap();
        let out = serialize(doc.root(), &SerializeOptions::default()).unwrap();
        assert_eq!(out, format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}", text));
    }

    #[test]
    fn test_interior_element_carries_namespaces() {
        let doc = parse("<r xmlns=\"urn:d\" xmlns:p=\"urn:p\"><p:x><y/></p:x></r>").unwrap();
        let x = doc.document_element().unwrap().child_nodes().next().unwrap();
        let out = serialize(x, &SerializeOptions::fragment()).unwrap();
        assert_eq!(out, "<p:x xmlns=\"urn:d\" xmlns:p=\"urn:p\"><y/></p:x>");
    }

    #[test]
    fn test_cdata_section_elements() {
        let doc = parse("<r><s>a]]&gt;b</s><t>c</t></r>").unwrap();
        let options = SerializeOptions {
            declaration: false,
            cdata_elements: vec![(None, "s".to_string())],
            ..SerializeOptions::default()
        };
        let out = serialize(doc.root(), &options).unwrap();
        assert_eq!(out, "<r><s><![CDATA[a]]]]><![CDATA[>b]]></s><t>c</t></r>");
    }
}
