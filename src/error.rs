use thiserror::Error;
use xmlquery_dom::DomError;
use xmlquery_xpath1::XPathError;

/// Everything a query, transform or value extraction can fail with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XmlError {
    #[error("Cannot parse xml: {message}\n{content}")]
    MalformedDocument { message: String, content: String },

    #[error("Cannot read xml from {location}: {message}")]
    Unreadable { location: String, message: String },

    #[error("Invalid XPath expression '{xpath}': {message}")]
    InvalidXPath { xpath: String, message: String },

    #[error("Invalid selection '{xpath}': {message}")]
    InvalidSelection { xpath: String, message: String },

    #[error("Invalid operation '{xpath}': {message}")]
    InvalidOperation { xpath: String, message: String },

    #[error("invalid xslt: {message}\n{stylesheet}")]
    InvalidStylesheet { message: String, stylesheet: String },

    #[error("Cannot retrieve single value with XPath '{xpath}', because it had no results in document\n{document}")]
    ValueNotFound { xpath: String, document: String },

    #[error("Cannot extract single value with XPath '{xpath}', because it resulted in {count} values in document\n{document}")]
    AmbiguousValue {
        xpath: String,
        document: String,
        count: usize,
    },
}

impl XmlError {
    /// Maps an XPath failure: problems found while compiling the expression
    /// are `InvalidXPath`, the rest happened while evaluating it.
    pub(crate) fn from_xpath(xpath: &str, err: XPathError, hint: &str) -> Self {
        if err.is_static() {
            XmlError::InvalidXPath {
                xpath: xpath.to_string(),
                message: err.to_string(),
            }
        } else {
            XmlError::InvalidOperation {
                xpath: xpath.to_string(),
                message: format!("{}. {}", err, hint),
            }
        }
    }

    pub(crate) fn malformed(message: impl ToString, content: &str) -> Self {
        XmlError::MalformedDocument {
            message: message.to_string(),
            content: content.to_string(),
        }
    }
}

/// Tree failures that surface after parsing, while re-rooting or writing a
/// tree that has no source text of its own.
impl From<DomError> for XmlError {
    fn from(err: DomError) -> Self {
        XmlError::MalformedDocument {
            message: err.to_string(),
            content: String::new(),
        }
    }
}
