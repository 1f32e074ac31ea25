// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod condition;
pub mod experiment;
pub mod parameters;
pub mod state;

pub use condition::{CONDITION_FIELDS, Comparator, Condition, ConditionAction, Trigger};
pub use experiment::{
    AUTOMATIC_FIELDS, Experiment, ExperimentBuilder, MANDATORY_FIELDS, OPTIONAL_FIELDS,
};
pub use parameters::{ParameterValue, Parameters, format_parameters, placeholder_names};
pub use state::{ExperimentState, StateRecord};
