use crate::executor::ExecutionError;
use thiserror::Error;
use xmlquery_dom::DomError;
use xmlquery_traits::ResolveError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub col: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

impl From<roxmltree::TextPos> for Location {
    fn from(pos: roxmltree::TextPos) -> Self {
        Location {
            line: pos.row,
            col: pos.col,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum XsltError {
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] roxmltree::Error),

    #[error("XPath error: {0}")]
    XPath(#[from] xmlquery_xpath1::XPathError),

    #[error("Invalid XPath '{expr}' at {location}: {message}")]
    XPathAt {
        expr: String,
        message: String,
        location: Location,
    },

    #[error("Template structure error: {message} at {location}")]
    TemplateStructure { message: String, location: Location },

    #[error("Template compilation error: {0}")]
    Compilation(String),

    #[error("{0}")]
    Import(String),

    #[error("Circular import of '{0}'")]
    CircularImport(String),

    #[error("Template execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Document error: {0}")]
    Dom(#[from] DomError),
}

impl From<ResolveError> for XsltError {
    fn from(err: ResolveError) -> Self {
        XsltError::Import(err.to_string())
    }
}

impl XsltError {
    pub(crate) fn structure(message: impl Into<String>, location: Location) -> Self {
        XsltError::TemplateStructure {
            message: message.into(),
            location,
        }
    }

    /// True when the stylesheet itself is broken, as opposed to a failure
    /// while running it.
    pub fn is_static(&self) -> bool {
        !matches!(self, XsltError::Execution(_))
    }
}
