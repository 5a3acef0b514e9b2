//! Immutable XML documents queried with XPath 1.0 and transformed with
//! XSLT 1.0.
//!
//! ```no_run
//! use xmlquery::{SingleValue, Stylesheet, XmlQuery};
//!
//! # fn main() -> Result<(), xmlquery::XmlError> {
//! let xml = XmlQuery::new("<root><a><x attr='test'>1</x></a></root>")?;
//! let first = &xml.nodes("/root/a")?[0];
//! assert_eq!(first.values("x/@attr")?, vec!["test"]);
//! assert_eq!(SingleValue::new(&xml, "count(//x)").required()?, "1");
//!
//! let stripped = Stylesheet::stripped().transformed_to_text(&XmlQuery::new("<a> <b/> </a>")?)?;
//! assert_eq!(stripped, "<a><b/></a>");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod extract;
pub mod namespace;
pub mod query;
pub mod source;
pub mod stylesheet;

pub use error::XmlError;
pub use extract::SingleValue;
pub use namespace::{NamespaceContext, NamespaceScope, WELL_KNOWN_NAMESPACES};
pub use query::XmlQuery;
pub use source::{ByteSource, Encoded, XmlSource};
pub use stylesheet::Stylesheet;

pub use xmlquery_dom::Node;
pub use xmlquery_resource::{FilesystemResolver, FolderResolver};
pub use xmlquery_traits::{EmptyResolver, InMemoryResolver, ResolveError, UriResolver};
pub use xmlquery_xslt::{ExecutionConfig, ParamValue};
