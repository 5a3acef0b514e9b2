use thiserror::Error;

/// Errors raised while decoding, parsing, building or writing a tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("XML parse error: {message}")]
    Parse { message: String },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Tree construction error: {0}")]
    Builder(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl From<roxmltree::Error> for DomError {
    fn from(err: roxmltree::Error) -> Self {
        DomError::Parse {
            message: err.to_string(),
        }
    }
}
