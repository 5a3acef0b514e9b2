//! Small helpers for reading stylesheet elements.

use crate::error::{Location, XsltError};
use roxmltree::Node;
use xmlquery_dom::Namespace;
use xmlquery_xpath1::XML_NAMESPACE;

pub(crate) type XslNode<'d, 'i> = Node<'d, 'i>;

pub(crate) fn location_of(node: XslNode<'_, '_>) -> Location {
    node.document().text_pos_at(node.range().start).into()
}

/// The element's name as written, e.g. `xsl:value-of`.
pub(crate) fn display_name(node: XslNode<'_, '_>) -> String {
    let tag = node.tag_name();
    match element_prefix(node) {
        Some(prefix) => format!("{}:{}", prefix, tag.name()),
        None => tag.name().to_string(),
    }
}

pub(crate) fn get_attr_optional<'d>(node: XslNode<'d, '_>, name: &str) -> Option<&'d str> {
    node.attribute(name)
}

pub(crate) fn get_attr_required<'d>(node: XslNode<'d, '_>, name: &str) -> Result<&'d str, XsltError> {
    node.attribute(name).ok_or_else(|| {
        XsltError::structure(
            format!(
                "Required attribute '{}' missing on element '{}'",
                name,
                display_name(node)
            ),
            location_of(node),
        )
    })
}

/// Reads a `yes`/`no` attribute.
pub(crate) fn get_attr_yes_no(node: XslNode<'_, '_>, name: &str) -> Result<bool, XsltError> {
    match node.attribute(name) {
        None | Some("no") => Ok(false),
        Some("yes") => Ok(true),
        Some(other) => Err(XsltError::structure(
            format!("Attribute '{}' must be 'yes' or 'no', got '{}'", name, other),
            location_of(node),
        )),
    }
}

/// The prefix the stylesheet uses for `uri` at `node`, if any.
pub(crate) fn prefix_for(node: XslNode<'_, '_>, uri: &str) -> Option<String> {
    if uri == XML_NAMESPACE {
        return Some("xml".to_string());
    }
    node.namespaces()
        .find(|ns| ns.uri() == uri && ns.name().is_some())
        .and_then(|ns| ns.name().map(str::to_string))
}

/// The element's own prefix, `None` when it uses the default namespace.
pub(crate) fn element_prefix(node: XslNode<'_, '_>) -> Option<String> {
    let uri = node.tag_name().namespace()?;
    if node.lookup_namespace_uri(None) == Some(uri) {
        return None;
    }
    prefix_for(node, uri)
}

/// Namespace bindings in scope at `node`, minus the reserved `xml` prefix.
pub(crate) fn in_scope_namespaces(node: XslNode<'_, '_>) -> Vec<Namespace> {
    node.namespaces()
        .filter(|ns| ns.uri() != XML_NAMESPACE)
        .map(|ns| Namespace::new(ns.name(), ns.uri()))
        .collect()
}

/// Whether `xml:space="preserve"` applies at `node`.
pub(crate) fn preserves_space(node: XslNode<'_, '_>) -> bool {
    node.ancestors()
        .filter(|n| n.is_element())
        .find_map(|n| n.attribute((XML_NAMESPACE, "space")))
        == Some("preserve")
}

/// Splits a whitespace-separated list attribute.
pub(crate) fn tokens(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Splits `prefix:local`.
pub(crate) fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

pub(crate) fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

pub(crate) fn is_qname(name: &str) -> bool {
    match split_qname(name) {
        (Some(prefix), local) => is_ncname(prefix) && is_ncname(local),
        (None, local) => is_ncname(local),
    }
}
