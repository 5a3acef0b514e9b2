//! XSLT 1.0 over the xmlquery document model.
//!
//! A stylesheet is compiled once into a [`CompiledStylesheet`], with imports
//! and includes loaded through a [`xmlquery_traits::UriResolver`], then run
//! by a [`TemplateExecutor`] against any tree implementing
//! [`xmlquery_xpath1::DataSourceNode`].

pub mod ast;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod output;
pub mod pattern;
pub mod processor;

mod compiler_handlers;
mod executor_handlers;
mod scope;
mod util;

pub use ast::{CompiledStylesheet, OutputDeclaration, OutputMethod};
pub use error::{Location, XsltError};
pub use executor::{ExecutionConfig, ExecutionError, TemplateExecutor};
pub use output::{OutputBuilder, TextBuilder, TreeBuilder};
pub use processor::{ParamValue, TransformResult, XsltProcessor};
