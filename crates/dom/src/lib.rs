//! The node tree shared by queries and transformations: an immutable arena
//! document, read by `roxmltree` and written by `quick-xml`.

pub mod builder;
pub mod document;
pub mod encoding;
pub mod error;
pub mod node;
pub mod parse;
pub mod serialize;

pub use builder::DocumentBuilder;
pub use document::{Document, Name, Namespace, NodeId, NodeKind, NodeRef};
pub use error::DomError;
pub use node::Node;
pub use parse::{parse, parse_bytes};
pub use serialize::{SerializeOptions, serialize};
