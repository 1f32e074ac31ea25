// file: src/models/condition.rs
// description: log-driven experiment conditions that raise warnings or kill runs
// reference: internal data structures

use crate::error::NeronetError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Keys a condition definition must provide.
pub const CONDITION_FIELDS: [&str; 5] = ["variablename", "killvalue", "comparator", "when", "action"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Lt,
    Eq,
    Geq,
    Leq,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Gt => "gt",
            Comparator::Lt => "lt",
            Comparator::Eq => "eq",
            Comparator::Geq => "geq",
            Comparator::Leq => "leq",
        }
    }

    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Lt => value < threshold,
            Comparator::Eq => value == threshold,
            Comparator::Geq => value >= threshold,
            Comparator::Leq => value <= threshold,
        }
    }
}

impl FromStr for Comparator {
    type Err = NeronetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gt" => Ok(Comparator::Gt),
            "lt" => Ok(Comparator::Lt),
            "eq" => Ok(Comparator::Eq),
            "geq" => Ok(Comparator::Geq),
            "leq" => Ok(Comparator::Leq),
            other => Err(NeronetError::Validation(format!(
                "Unknown comparator: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Immediately,
    AfterMinutes(f64),
}

impl FromStr for Trigger {
    type Err = NeronetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix("time") {
            Some(minutes) => minutes
                .trim()
                .parse::<f64>()
                .map(Trigger::AfterMinutes)
                .map_err(|_| {
                    NeronetError::Validation(format!("Invalid time trigger: {}", s))
                }),
            None => Ok(Trigger::Immediately),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Immediately => f.write_str("immediately"),
            Trigger::AfterMinutes(minutes) => write!(f, "time {}", minutes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionAction {
    Kill,
    Warn,
}

impl ConditionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionAction::Kill => "kill",
            ConditionAction::Warn => "warn",
        }
    }
}

impl fmt::Display for ConditionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionAction {
    type Err = NeronetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "kill" => Ok(ConditionAction::Kill),
            "warn" => Ok(ConditionAction::Warn),
            other => Err(NeronetError::Validation(format!(
                "Unknown condition action: {}",
                other
            ))),
        }
    }
}

/// A watch on one variable printed to an experiment's log.
///
/// Log rows look like `<variable> <value>`. When the value compares true
/// against `kill_value` the condition yields its action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub variable_name: String,
    pub kill_value: f64,
    pub comparator: Comparator,
    pub when: Trigger,
    pub action: ConditionAction,
    pub start_time: DateTime<Local>,
}

impl Condition {
    pub fn new(
        name: &str,
        variable_name: &str,
        kill_value: f64,
        comparator: Comparator,
        when: Trigger,
        action: ConditionAction,
    ) -> Self {
        Self {
            name: name.trim().to_string(),
            variable_name: variable_name.trim().to_string(),
            kill_value,
            comparator,
            when,
            action,
            start_time: Local::now(),
        }
    }

    pub fn restart(&mut self, now: DateTime<Local>) {
        self.start_time = now;
    }

    pub fn evaluate(&self, logrow: &str, now: DateTime<Local>) -> Option<ConditionAction> {
        let logrow = logrow.trim();

        if let Trigger::AfterMinutes(minutes) = self.when {
            let elapsed_minutes = (now - self.start_time).num_seconds() / 60;
            if (elapsed_minutes as f64) < minutes {
                return None;
            }
        }

        let split = self.variable_name.len().min(logrow.len());
        let (name, rest) = (logrow.get(..split)?, logrow.get(split..)?);
        if name.trim() != self.variable_name {
            return None;
        }

        let value = rest.trim().parse::<f64>().ok()?;
        if self.comparator.holds(value, self.kill_value) {
            Some(self.action)
        } else {
            None
        }
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.variable_name == other.variable_name
            && self.kill_value == other.kill_value
            && self.comparator == other.comparator
            && self.when == other.when
            && self.action == other.action
    }
}
