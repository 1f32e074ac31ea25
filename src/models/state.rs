// file: src/models/state.rs
// description: experiment lifecycle states and timestamped state records
// reference: internal data structures

use crate::error::NeronetError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentState {
    Defined,
    Submitted,
    SubmittedToKid,
    Lost,
    Terminated,
    Running,
    Finished,
}

impl ExperimentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentState::Defined => "defined",
            ExperimentState::Submitted => "submitted",
            ExperimentState::SubmittedToKid => "submitted_to_kid",
            ExperimentState::Lost => "lost",
            ExperimentState::Terminated => "terminated",
            ExperimentState::Running => "running",
            ExperimentState::Finished => "finished",
        }
    }

    /// Outputs are only worth reading once the experiment has produced some.
    pub fn has_output(&self) -> bool {
        matches!(self, ExperimentState::Running | ExperimentState::Finished)
    }
}

impl fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentState {
    type Err = NeronetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "defined" => Ok(ExperimentState::Defined),
            "submitted" => Ok(ExperimentState::Submitted),
            "submitted_to_kid" => Ok(ExperimentState::SubmittedToKid),
            "lost" => Ok(ExperimentState::Lost),
            "terminated" => Ok(ExperimentState::Terminated),
            "running" => Ok(ExperimentState::Running),
            "finished" => Ok(ExperimentState::Finished),
            other => Err(NeronetError::Validation(format!(
                "Unknown experiment state: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub state: ExperimentState,
    pub timestamp: DateTime<Local>,
}

impl StateRecord {
    pub fn new(state: ExperimentState, timestamp: DateTime<Local>) -> Self {
        Self { state, timestamp }
    }
}
