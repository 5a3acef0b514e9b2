pub mod resolver;

pub use resolver::{
    EmptyResolver, InMemoryResolver, ResolveError, SharedBytes, UriResolver, join_uri,
};
