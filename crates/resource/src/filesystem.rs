//! Filesystem-backed resolver.
//!
//! Relative references are read below a base directory. Paths that would
//! escape it, including absolute paths and `file:` URIs pointing elsewhere,
//! are refused.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use url::Url;
use xmlquery_traits::{ResolveError, SharedBytes, UriResolver};

#[derive(Debug)]
pub struct FilesystemResolver {
    base_path: PathBuf,
    /// Canonicalized base path for containment checks
    canonical_base: Option<PathBuf>,
}

impl FilesystemResolver {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        let base = base_path.as_ref().to_path_buf();
        let canonical = base.canonicalize().ok();
        Self {
            base_path: base,
            canonical_base: canonical,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base_path
    }

    fn within_base(&self, path: &Path) -> Option<PathBuf> {
        let canonical = path.canonicalize().ok()?;
        let base = self.canonical_base.as_ref()?;
        canonical.starts_with(base).then_some(canonical)
    }

    /// Maps a reference onto a path below the base, or `None` if it would
    /// leave the base directory.
    fn resolve_path_safe(&self, uri: &str) -> Option<PathBuf> {
        if uri.starts_with("file:") {
            let path = Url::parse(uri).ok()?.to_file_path().ok()?;
            return self.within_base(&path);
        }
        if Path::new(uri).is_absolute() {
            return None;
        }
        let full_path = self.base_path.join(uri);
        if full_path.exists() {
            return self.within_base(&full_path);
        }
        if Path::new(uri)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return None;
        }
        Some(full_path)
    }
}

impl UriResolver for FilesystemResolver {
    fn resolve_entity(&self, uri: &str) -> Result<SharedBytes, ResolveError> {
        let full_path = self
            .resolve_path_safe(uri)
            .ok_or_else(|| ResolveError::NotFound(format!("{} (outside of base directory)", uri)))?;
        log::debug!("Reading '{}' from {}", uri, full_path.display());
        std::fs::read(&full_path).map(Arc::new).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResolveError::NotFound(uri.to_string())
            } else {
                ResolveError::LoadFailed {
                    uri: uri.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn name(&self) -> &'static str {
        "FilesystemResolver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_reads_relative_and_nested_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib").join("b.xsl"), b"<b/>").unwrap();

        let resolver = FilesystemResolver::new(dir.path());
        let uri = resolver.resolve_uri(Some("lib/a.xsl"), "b.xsl").unwrap();
        assert_eq!(&*resolver.resolve_entity(&uri).unwrap(), b"<b/>");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let resolver = FilesystemResolver::new(dir.path());
        assert!(matches!(
            resolver.resolve_entity("none.xsl"),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_blocks_traversal_and_absolute_paths() {
        let dir = tempdir().unwrap();
        let resolver = FilesystemResolver::new(dir.path());
        assert!(resolver.resolve_entity("../../../etc/passwd").is_err());
        assert!(resolver.resolve_entity("/etc/passwd").is_err());
        assert!(resolver.resolve_entity("file:///etc/passwd").is_err());
        assert!(resolver.resolve_entity("sub/../../secret").is_err());
    }

    #[test]
    fn test_accepts_file_uris_inside_base() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("in.xsl");
        fs::write(&file, b"<in/>").unwrap();
        let resolver = FilesystemResolver::new(dir.path());
        let uri = Url::from_file_path(file.canonicalize().unwrap()).unwrap();
        assert_eq!(&*resolver.resolve_entity(uri.as_str()).unwrap(), b"<in/>");
    }
}
