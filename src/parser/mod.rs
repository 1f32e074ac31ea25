// file: src/parser/mod.rs
// description: experiment definition and call string parsing module exports
// reference: internal module structure

pub mod args;
pub mod definition;

pub use args::{CallSpec, split_args};
pub use definition::DefinitionParser;
