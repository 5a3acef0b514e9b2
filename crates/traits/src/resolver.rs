//! UriResolver trait for loading the stylesheets an `xsl:import` or
//! `xsl:include` points at.
//!
//! The transformation engine never touches the filesystem itself; every
//! external reference goes through one of these.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Error type for import resolution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error(
        "Cannot resolve stylesheet '{0}' No XSL sources configured - use Stylesheet::with_resolver to add them."
    )]
    NoSources(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to load resource '{uri}': {message}")]
    LoadFailed { uri: String, message: String },

    #[error("Unsupported: cannot resolve '{0}' from any configured location")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        ResolveError::Io(err.to_string())
    }
}

/// Reference-counted resource bytes.
pub type SharedBytes = Arc<Vec<u8>>;

/// Loads resources named by URI and makes relative references absolute.
///
/// Implementations must be shareable across threads: a compiled stylesheet
/// holds its resolver behind an `Arc` and may be used concurrently.
pub trait UriResolver: Send + Sync + Debug {
    /// Loads the bytes behind an absolute URI.
    fn resolve_entity(&self, uri: &str) -> Result<SharedBytes, ResolveError>;

    /// Turns `relative` into an absolute URI against `base`. The default
    /// joins them like paths.
    fn resolve_uri(&self, base: Option<&str>, relative: &str) -> Result<String, ResolveError> {
        Ok(join_uri(base, relative))
    }

    /// A human-readable name for logging.
    fn name(&self) -> &'static str;
}

impl<R: UriResolver + ?Sized> UriResolver for Arc<R> {
    fn resolve_entity(&self, uri: &str) -> Result<SharedBytes, ResolveError> {
        (**self).resolve_entity(uri)
    }

    fn resolve_uri(&self, base: Option<&str>, relative: &str) -> Result<String, ResolveError> {
        (**self).resolve_uri(base, relative)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Joins a reference onto the directory of `base`, folding `.` and `..`
/// segments. References with a scheme or a leading `/` are returned as they are.
pub fn join_uri(base: Option<&str>, relative: &str) -> String {
    if relative.starts_with('/') || has_scheme(relative) {
        return relative.to_string();
    }
    let dir = match base.and_then(|b| b.rfind('/').map(|i| &b[..=i])) {
        Some(dir) => dir,
        None => "",
    };
    let joined = format!("{}{}", dir, relative);
    let (prefix, path) = split_authority(&joined);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                if matches!(segments.last(), Some(s) if !s.is_empty() && *s != "..") {
                    segments.pop();
                } else if segments.is_empty() {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }
    format!("{}{}", prefix, segments.join("/"))
}

fn has_scheme(uri: &str) -> bool {
    match uri.find(':') {
        Some(i) if i > 1 => uri[..i]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Splits `scheme://authority` (or `scheme:`) off the front of a URI.
fn split_authority(uri: &str) -> (&str, &str) {
    if !has_scheme(uri) {
        return ("", uri);
    }
    let colon = uri.find(':').unwrap_or(0);
    let rest = &uri[colon + 1..];
    if let Some(after) = rest.strip_prefix("//") {
        let end = after.find('/').map(|i| colon + 3 + i).unwrap_or(uri.len());
        (&uri[..end], &uri[end..])
    } else {
        (&uri[..=colon], rest)
    }
}

/// The resolver used when nothing was configured: every lookup fails with a
/// hint on how to add sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResolver;

impl UriResolver for EmptyResolver {
    fn resolve_entity(&self, uri: &str) -> Result<SharedBytes, ResolveError> {
        Err(ResolveError::NoSources(uri.to_string()))
    }

    fn resolve_uri(&self, _base: Option<&str>, relative: &str) -> Result<String, ResolveError> {
        Err(ResolveError::NoSources(relative.to_string()))
    }

    fn name(&self) -> &'static str {
        "EmptyResolver"
    }
}

/// Resolves against a pre-populated map of name to bytes.
#[derive(Debug, Default)]
pub struct InMemoryResolver {
    entries: RwLock<HashMap<String, SharedBytes>>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`InMemoryResolver::add`].
    pub fn with(self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(normalize(&name.into()), Arc::new(data.into()));
        }
        self
    }

    /// Adds or replaces an entry.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::LoadFailed` if the internal lock is poisoned.
    pub fn add(&self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<(), ResolveError> {
        let name = normalize(&name.into());
        let mut entries = self.entries.write().map_err(|_| ResolveError::LoadFailed {
            uri: name.clone(),
            message: "resolver lock poisoned".to_string(),
        })?;
        entries.insert(name, Arc::new(data.into()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(name: &str) -> String {
    join_uri(None, name.trim_start_matches("./"))
}

impl UriResolver for InMemoryResolver {
    fn resolve_entity(&self, uri: &str) -> Result<SharedBytes, ResolveError> {
        let entries = self.entries.read().map_err(|_| ResolveError::LoadFailed {
            uri: uri.to_string(),
            message: "resolver lock poisoned".to_string(),
        })?;
        let key = normalize(uri);
        entries
            .get(&key)
            .or_else(|| entries.get(key.trim_start_matches('/')))
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(uri.to_string()))
    }

    fn name(&self) -> &'static str {
        "InMemoryResolver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_uri() {
        assert_eq!(join_uri(None, "a.xsl"), "a.xsl");
        assert_eq!(join_uri(Some("xsl/main.xsl"), "lib/b.xsl"), "xsl/lib/b.xsl");
        assert_eq!(join_uri(Some("xsl/main.xsl"), "../c.xsl"), "c.xsl");
        assert_eq!(join_uri(Some("xsl/main.xsl"), "./d.xsl"), "xsl/d.xsl");
        assert_eq!(join_uri(Some("file:///tmp/x/main.xsl"), "e.xsl"), "file:///tmp/x/e.xsl");
        assert_eq!(join_uri(Some("file:///tmp/x/main.xsl"), "../e.xsl"), "file:///tmp/e.xsl");
        assert_eq!(join_uri(Some("xsl/main.xsl"), "http://h/f.xsl"), "http://h/f.xsl");
        assert_eq!(join_uri(Some("xsl/main.xsl"), "/abs.xsl"), "/abs.xsl");
    }

    #[test]
    fn test_empty_resolver_message() {
        let err = EmptyResolver.resolve_entity("second.xsl").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot resolve stylesheet 'second.xsl' No XSL sources configured - use Stylesheet::with_resolver to add them."
        );
        assert!(EmptyResolver.resolve_uri(None, "x.xsl").is_err());
    }

    #[test]
    fn test_in_memory_resolver() {
        let resolver = InMemoryResolver::new().with("xsl/second.xsl", "<x/>");
        resolver.add("./other.xsl", "<y/>").unwrap();
        assert_eq!(resolver.len(), 2);

        let uri = resolver.resolve_uri(Some("xsl/first.xsl"), "second.xsl").unwrap();
        assert_eq!(&*resolver.resolve_entity(&uri).unwrap(), b"<x/>");
        assert_eq!(&*resolver.resolve_entity("other.xsl").unwrap(), b"<y/>");
        assert!(matches!(
            resolver.resolve_entity("missing.xsl"),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_in_memory_resolver_overwrite() {
        let resolver = InMemoryResolver::new();
        resolver.add("a.xsl", "one").unwrap();
        resolver.add("a.xsl", "two").unwrap();
        assert_eq!(&*resolver.resolve_entity("a.xsl").unwrap(), b"two");
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn test_shared_resolver_delegates() {
        let shared: Arc<dyn UriResolver> = Arc::new(InMemoryResolver::new().with("a.xsl", "z"));
        assert_eq!(shared.name(), "InMemoryResolver");
        assert!(shared.resolve_entity("a.xsl").is_ok());
    }
}
