use xmlquery_traits::{ResolveError, SharedBytes, UriResolver};

/// Looks a referenced file name up in several folders of an inner resolver.
///
/// The root folder is always tried first, then the configured folders in
/// order. Only the file name of a reference is used, so an import of
/// `../common/page.xsl` is found as `page.xsl` in any of the folders.
#[derive(Debug)]
pub struct FolderResolver<R> {
    inner: R,
    folders: Vec<String>,
}

impl<R: UriResolver> FolderResolver<R> {
    pub fn new<I, S>(inner: R, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let folders = std::iter::once(String::new())
            .chain(
                folders
                    .into_iter()
                    .map(|f| f.into().trim_end_matches('/').to_string()),
            )
            .collect();
        Self { inner, folders }
    }

    fn candidates(&self, uri: &str) -> impl Iterator<Item = String> + '_ {
        let file = uri.rsplit('/').next().unwrap_or(uri).to_string();
        self.folders.iter().map(move |folder| {
            if folder.is_empty() {
                file.clone()
            } else {
                format!("{}/{}", folder, file)
            }
        })
    }
}

impl<R: UriResolver> UriResolver for FolderResolver<R> {
    fn resolve_entity(&self, uri: &str) -> Result<SharedBytes, ResolveError> {
        for candidate in self.candidates(uri) {
            match self.inner.resolve_entity(&candidate) {
                Ok(bytes) => {
                    log::debug!("Resolved '{}' as '{}'", uri, candidate);
                    return Ok(bytes);
                }
                Err(e) => log::trace!("'{}' not found: {}", candidate, e),
            }
        }
        Err(ResolveError::Unsupported(uri.to_string()))
    }

    fn resolve_uri(&self, base: Option<&str>, relative: &str) -> Result<String, ResolveError> {
        self.inner.resolve_uri(base, relative)
    }

    fn name(&self) -> &'static str {
        "FolderResolver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FilesystemResolver;
    use std::fs;
    use tempfile::tempdir;
    use xmlquery_traits::InMemoryResolver;

    #[test]
    fn test_tries_root_then_folders() {
        let inner = InMemoryResolver::new()
            .with("a.xsl", "root")
            .with("xsl/b.xsl", "folder")
            .with("other/b.xsl", "later");
        let resolver = FolderResolver::new(inner, ["xsl", "other"]);
        assert_eq!(&*resolver.resolve_entity("a.xsl").unwrap(), b"root");
        assert_eq!(&*resolver.resolve_entity("deep/path/b.xsl").unwrap(), b"folder");
    }

    #[test]
    fn test_unresolvable_reference_is_unsupported() {
        let resolver = FolderResolver::new(InMemoryResolver::new(), ["xsl"]);
        assert_eq!(
            resolver.resolve_entity("nope.xsl"),
            Err(ResolveError::Unsupported("nope.xsl".to_string()))
        );
    }

    #[test]
    fn test_over_filesystem() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets").join("page.xsl"), b"<p/>").unwrap();
        let resolver = FolderResolver::new(FilesystemResolver::new(dir.path()), ["assets/"]);
        assert_eq!(&*resolver.resolve_entity("../page.xsl").unwrap(), b"<p/>");
    }
}
