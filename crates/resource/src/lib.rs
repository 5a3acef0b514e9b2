//! Resolver implementations backed by real storage.
//!
//! - [`FilesystemResolver`]: reads files below a base directory
//! - [`FolderResolver`]: searches a list of folders over another resolver
//!
//! The in-memory and empty resolvers live in `xmlquery-traits` and are
//! re-exported here for convenience.

mod filesystem;
mod folders;

pub use filesystem::FilesystemResolver;
pub use folders::FolderResolver;

pub use xmlquery_traits::{EmptyResolver, InMemoryResolver};
