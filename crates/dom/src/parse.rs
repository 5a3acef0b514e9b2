//! Reads XML text into a [`Document`] through `roxmltree`.

use crate::builder::DocumentBuilder;
use crate::document::{Document, Name, Namespace};
use crate::encoding;
use crate::error::DomError;
use roxmltree::{Node, NodeType as RoxNodeType, ParsingOptions};
use xmlquery_xpath1::XML_NAMESPACE;

/// Parses well-formed XML text. Internal DTD subsets are accepted so that
/// their entities expand.
pub fn parse(text: &str) -> Result<Document, DomError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let options = ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let source = roxmltree::Document::parse_with_options(text, options)?;
    let mut builder = DocumentBuilder::new();
    for child in source.root().children() {
        copy(&mut builder, child)?;
    }
    let doc = builder.finish()?;
    log::trace!("Parsed document with {} nodes", doc.len());
    Ok(doc)
}

/// Decodes `bytes` (see [`encoding::decode`]) and parses the result.
pub fn parse_bytes(bytes: &[u8]) -> Result<Document, DomError> {
    let text = encoding::decode(bytes)?;
    parse(&text)
}

fn copy(builder: &mut DocumentBuilder, node: Node<'_, '_>) -> Result<(), DomError> {
    match node.node_type() {
        RoxNodeType::Element => {
            let tag = node.tag_name();
            let prefix = tag
                .namespace()
                .and_then(|uri| element_prefix(node, uri));
            let name = Name::qualified(prefix, tag.namespace(), tag.name());
            let declared: Vec<Namespace> = node
                .namespaces()
                .filter(|ns| ns.uri() != XML_NAMESPACE)
                .map(|ns| Namespace::new(ns.name(), ns.uri()))
                .collect();
            builder.start_element(name, &declared)?;
            for attr in node.attributes() {
                let prefix = attr.namespace().and_then(|uri| attribute_prefix(node, uri));
                let name = Name::qualified(prefix, attr.namespace(), attr.name());
                builder.attribute(name, attr.value())?;
            }
            for child in node.children() {
                copy(builder, child)?;
            }
            builder.end_element()
        }
        RoxNodeType::Text => {
            builder.text(node.text().unwrap_or_default());
            Ok(())
        }
        RoxNodeType::Comment => {
            builder.comment(node.text().unwrap_or_default());
            Ok(())
        }
        RoxNodeType::PI => match node.pi() {
            Some(pi) => builder.processing_instruction(pi.target, pi.value.unwrap_or_default()),
            None => Ok(()),
        },
        RoxNodeType::Root => Ok(()),
    }
}

/// The prefix the parser saw for an element name. A default namespace with the
/// same URI wins over a prefixed one.
fn element_prefix<'input>(node: Node<'_, 'input>, uri: &str) -> Option<&'input str> {
    if uri == XML_NAMESPACE {
        return Some("xml");
    }
    if node.lookup_namespace_uri(None) == Some(uri) {
        return None;
    }
    node.lookup_prefix(uri)
}

/// Attributes never take the default namespace.
fn attribute_prefix<'input>(node: Node<'_, 'input>, uri: &str) -> Option<&'input str> {
    if uri == XML_NAMESPACE {
        return Some("xml");
    }
    node.namespaces()
        .filter(|ns| ns.uri() == uri)
        .find_map(|ns| ns.name())
}
