// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod output;
pub mod parser;
pub mod report;
pub mod store;
pub mod utils;

pub use config::{Config, DefinitionConfig, MonitorConfig, StorageConfig};
pub use error::{NeronetError, Result};
pub use models::{
    Comparator, Condition, ConditionAction, Experiment, ExperimentBuilder, ExperimentState,
    ParameterValue, Parameters, StateRecord, Trigger,
};
pub use monitor::{ConditionMonitor, MonitorReport};
pub use output::{OutputData, OutputReader, PlotRenderer, PlotterRegistry, ProcessorRegistry};
pub use parser::{CallSpec, DefinitionParser};
pub use report::StatusReport;
pub use store::ExperimentStore;
pub use utils::Validator;
