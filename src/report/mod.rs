// file: src/report/mod.rs
// description: status reporting module exports
// reference: internal module structure

pub mod status;

pub use status::StatusReport;
