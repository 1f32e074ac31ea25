// file: src/monitor/mod.rs
// description: log condition monitoring module exports
// reference: internal module structure

pub mod watcher;

pub use watcher::{ConditionMonitor, MonitorReport};
