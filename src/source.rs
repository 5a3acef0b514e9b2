//! Everything a query can be built from. Each input kind is a small adapter
//! that ends in a parsed [`Node`].

use crate::error::XmlError;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;
use xmlquery_dom::encoding::{decode, decode_with_label};
use xmlquery_dom::{Node, parse};

/// Something that yields a parsed tree.
pub trait XmlSource {
    fn load(&self) -> Result<Node, XmlError>;
}

/// Raw, still encoded, input.
pub trait ByteSource {
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, XmlError>;

    /// Where the bytes come from, for error messages.
    fn location(&self) -> String;
}

/// Bytes of any [`ByteSource`] decoded with an explicit encoding label
/// such as `"utf-16"` or `"windows-1252"`. A byte order mark still wins.
#[derive(Debug, Clone)]
pub struct Encoded<S> {
    source: S,
    label: String,
}

impl<S> Encoded<S> {
    pub fn new(source: S, label: impl Into<String>) -> Self {
        Self {
            source,
            label: label.into(),
        }
    }
}

impl<T: XmlSource + ?Sized> XmlSource for &T {
    fn load(&self) -> Result<Node, XmlError> {
        (**self).load()
    }
}

impl XmlSource for str {
    fn load(&self) -> Result<Node, XmlError> {
        let document = parse(self).map_err(|e| XmlError::malformed(e, self))?;
        Ok(Node::from_document(Arc::new(document)))
    }
}

impl XmlSource for String {
    fn load(&self) -> Result<Node, XmlError> {
        self.as_str().load()
    }
}

impl XmlSource for Node {
    fn load(&self) -> Result<Node, XmlError> {
        Ok(self.clone())
    }
}

fn load_bytes<S: ByteSource + ?Sized>(source: &S, label: Option<&str>) -> Result<Node, XmlError> {
    let bytes = source.read_bytes()?;
    let decoded = match label {
        Some(label) => decode_with_label(&bytes, label),
        None => decode(&bytes),
    };
    let text = decoded.map_err(|e| XmlError::Unreadable {
        location: source.location(),
        message: e.to_string(),
    })?;
    text.as_str().load()
}

impl<S: ByteSource> XmlSource for Encoded<S> {
    fn load(&self) -> Result<Node, XmlError> {
        load_bytes(&self.source, Some(&self.label))
    }
}

impl ByteSource for [u8] {
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, XmlError> {
        Ok(Cow::Borrowed(self))
    }

    fn location(&self) -> String {
        "byte stream".to_string()
    }
}

impl XmlSource for [u8] {
    fn load(&self) -> Result<Node, XmlError> {
        load_bytes(self, None)
    }
}

impl ByteSource for &[u8] {
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, XmlError> {
        Ok(Cow::Borrowed(self))
    }

    fn location(&self) -> String {
        "byte stream".to_string()
    }
}

impl ByteSource for Vec<u8> {
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, XmlError> {
        Ok(Cow::Borrowed(self.as_slice()))
    }

    fn location(&self) -> String {
        "byte stream".to_string()
    }
}

impl XmlSource for Vec<u8> {
    fn load(&self) -> Result<Node, XmlError> {
        load_bytes(self, None)
    }
}

impl ByteSource for Path {
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, XmlError> {
        log::debug!("Reading xml from {}", self.display());
        std::fs::read(self)
            .map(Cow::Owned)
            .map_err(|e| XmlError::Unreadable {
                location: self.location(),
                message: e.to_string(),
            })
    }

    fn location(&self) -> String {
        self.display().to_string()
    }
}

impl XmlSource for Path {
    fn load(&self) -> Result<Node, XmlError> {
        load_bytes(self, None)
    }
}

impl ByteSource for PathBuf {
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, XmlError> {
        self.as_path().read_bytes()
    }

    fn location(&self) -> String {
        self.as_path().location()
    }
}

impl XmlSource for PathBuf {
    fn load(&self) -> Result<Node, XmlError> {
        load_bytes(self, None)
    }
}

/// Only `file:` URIs can be read.
impl ByteSource for Url {
    fn read_bytes(&self) -> Result<Cow<'_, [u8]>, XmlError> {
        if self.scheme() != "file" {
            return Err(XmlError::Unreadable {
                location: self.location(),
                message: format!("unsupported URI scheme '{}'", self.scheme()),
            });
        }
        let path = self.to_file_path().map_err(|_| XmlError::Unreadable {
            location: self.location(),
            message: "URI does not name a local file".to_string(),
        })?;
        let bytes = path.read_bytes()?.into_owned();
        Ok(Cow::Owned(bytes))
    }

    fn location(&self) -> String {
        self.as_str().to_string()
    }
}

impl XmlSource for Url {
    fn load(&self) -> Result<Node, XmlError> {
        load_bytes(self, None)
    }
}
