//! Prefix to namespace URI mappings visible to XPath expressions.

use std::fmt;
use std::sync::Arc;
use xmlquery_xpath1::{NamespaceResolver, XML_NAMESPACE, XMLNS_NAMESPACE};

/// Prefixes every fresh [`NamespaceContext`] knows.
pub const WELL_KNOWN_NAMESPACES: [(&str, &str); 5] = [
    ("xhtml", "http://www.w3.org/1999/xhtml"),
    ("xs", "http://www.w3.org/2001/XMLSchema"),
    ("xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    ("xsl", "http://www.w3.org/1999/XSL/Transform"),
    ("svg", "http://www.w3.org/2000/svg"),
];

/// Which mappings [`NamespaceContext::namespaces_in_scope`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamespaceScope {
    #[default]
    All,
    /// Everything except entries for the reserved `xml` and `xmlns` prefixes.
    ExcludeXml,
}

/// An immutable prefix → URI mapping, optionally backed by delegate contexts.
///
/// Lookups check the context's own mappings first, then every delegate in
/// the order given, then the `xml` and `xmlns` prefixes reserved by the XML
/// specification. An unknown prefix is not an error, it simply maps to no
/// namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceContext {
    own: Vec<(String, String)>,
    delegates: Vec<Arc<NamespaceContext>>,
}

impl Default for NamespaceContext {
    fn default() -> Self {
        Self::from_pairs(WELL_KNOWN_NAMESPACES)
    }
}

impl NamespaceContext {
    /// A context with no mappings at all, not even the well-known ones.
    pub fn empty() -> Self {
        Self {
            own: Vec::new(),
            delegates: Vec::new(),
        }
    }

    /// Binds each URI to an automatic prefix: `ns0`, `ns1` and so on.
    pub fn from_uris<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_pairs(
            uris.into_iter()
                .enumerate()
                .map(|(idx, uri)| (format!("ns{}", idx), uri.into())),
        )
    }

    /// A context made of exactly the given pairs. A repeated prefix keeps
    /// its last URI.
    pub fn from_pairs<I, P, U>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, U)>,
        P: Into<String>,
        U: Into<String>,
    {
        let mut context = Self::empty();
        for (prefix, uri) in pairs {
            context.insert(prefix.into(), uri.into());
        }
        context
    }

    /// A context with `own` mappings that falls back to `delegates`.
    pub fn chained<I>(own: NamespaceContext, delegates: I) -> Self
    where
        I: IntoIterator<Item = NamespaceContext>,
    {
        let mut context = own;
        context
            .delegates
            .extend(delegates.into_iter().map(Arc::new));
        context
    }

    /// Everything this context resolves plus `prefix` bound to `uri`. The
    /// receiver is left untouched.
    pub fn with(&self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let mut merged = Self::from_pairs(self.namespaces_in_scope(NamespaceScope::All));
        merged.insert(prefix.into(), uri.into());
        merged
    }

    fn insert(&mut self, prefix: String, uri: String) {
        match self.own.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = uri,
            None => self.own.push((prefix, uri)),
        }
    }

    /// The URI bound to `prefix`, or `None` for "no namespace".
    pub fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        if let Some((_, uri)) = self.own.iter().find(|(p, _)| p == prefix) {
            return Some(uri);
        }
        if let Some(uri) = self
            .delegates
            .iter()
            .find_map(|delegate| delegate.lookup_namespace(prefix))
        {
            return Some(uri);
        }
        match prefix {
            "xml" => Some(XML_NAMESPACE),
            "xmlns" => Some(XMLNS_NAMESPACE),
            _ => None,
        }
    }

    /// The first prefix in scope bound to `uri`.
    pub fn lookup_prefix(&self, uri: &str) -> Option<String> {
        self.namespaces_in_scope(NamespaceScope::All)
            .into_iter()
            .find(|(_, bound)| bound == uri)
            .map(|(prefix, _)| prefix)
    }

    /// Own mappings followed by each delegate's mappings for the same scope.
    /// On a repeated prefix the earlier entry wins.
    pub fn namespaces_in_scope(&self, scope: NamespaceScope) -> Vec<(String, String)> {
        let mut result: Vec<(String, String)> = Vec::new();
        for (prefix, uri) in &self.own {
            if scope == NamespaceScope::ExcludeXml && is_reserved(prefix) {
                continue;
            }
            result.push((prefix.clone(), uri.clone()));
        }
        for delegate in &self.delegates {
            for (prefix, uri) in delegate.namespaces_in_scope(scope) {
                if !result.iter().any(|(p, _)| *p == prefix) {
                    result.push((prefix, uri));
                }
            }
        }
        result
    }
}

fn is_reserved(prefix: &str) -> bool {
    prefix == "xml" || prefix == "xmlns"
}

impl NamespaceResolver for NamespaceContext {
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self.lookup_namespace(prefix).map(str::to_string)
    }
}

impl fmt::Display for NamespaceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (prefix, uri)) in self.own.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", prefix, uri)?;
        }
        Ok(())
    }
}
