// file: src/store/mod.rs
// description: experiment persistence module exports
// reference: internal module structure

pub mod persistence;

pub use persistence::ExperimentStore;
