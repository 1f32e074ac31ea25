// file: src/monitor/watcher.rs
// description: evaluates experiment conditions against a stream of log lines
// reference: https://docs.rs/tokio/latest/tokio/io/trait.AsyncBufReadExt.html

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::models::{ConditionAction, Experiment, ExperimentState};
use chrono::Local;
use std::collections::HashSet;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorReport {
    pub lines_read: usize,
    pub warnings_raised: usize,
    pub killed_by: Option<String>,
}

impl MonitorReport {
    pub fn was_killed(&self) -> bool {
        self.killed_by.is_some()
    }
}

pub struct ConditionMonitor {
    stop_on_kill: bool,
}

impl ConditionMonitor {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            stop_on_kill: config.stop_on_kill,
        }
    }

    /// Feeds every log line to the experiment's conditions.
    ///
    /// A `warn` records one warning per condition for the whole stream. A
    /// `kill` records a warning and moves the experiment to `terminated`.
    pub async fn watch<R>(&self, experiment: &mut Experiment, reader: R) -> Result<MonitorReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut report = MonitorReport::default();
        let mut warned = HashSet::new();
        let mut lines = reader.lines();

        info!(
            "{}: watching log output against {} conditions",
            experiment.id,
            experiment.conditions.len()
        );

        while let Some(line) = lines.next_line().await? {
            report.lines_read += 1;

            let Some((action, condition)) = experiment.action_for_at(&line, Local::now()) else {
                continue;
            };
            debug!("{}: condition {} matched '{}'", experiment.id, condition, line.trim());

            match action {
                ConditionAction::Warn => {
                    if warned.insert(condition.clone()) {
                        warn!("{}: condition '{}' was met", experiment.id, condition);
                        experiment.set_warning(&condition);
                        report.warnings_raised += 1;
                    }
                }
                ConditionAction::Kill => {
                    if report.killed_by.is_none() {
                        warn!("{}: condition '{}' kills the experiment", experiment.id, condition);
                        experiment.set_warning(&condition);
                        experiment.update_state(ExperimentState::Terminated);
                        report.warnings_raised += 1;
                        report.killed_by = Some(condition);
                    }
                    if self.stop_on_kill {
                        break;
                    }
                }
            }
        }

        info!(
            "{}: read {} lines, {} warnings",
            experiment.id, report.lines_read, report.warnings_raised
        );
        Ok(report)
    }
}
