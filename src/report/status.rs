// file: src/report/status.rs
// description: human readable experiment status text
// reference: internal reporting

use crate::models::Experiment;
use crate::output::OutputReader;
use std::fmt::Write as _;
use tracing::debug;

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct StatusReport<'a> {
    reader: &'a OutputReader,
}

impl<'a> StatusReport<'a> {
    pub fn new(reader: &'a OutputReader) -> Self {
        Self { reader }
    }

    /// `<id> <state>`, flagged when warnings exist.
    pub fn summary_line(experiment: &Experiment) -> String {
        if experiment.has_warnings() {
            format!("{} WARNING", experiment)
        } else {
            experiment.to_string()
        }
    }

    pub fn render(&self, experiment: &Experiment) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", experiment.id);
        let _ = writeln!(out, "  Run command: {}", experiment.run_command_prefix);
        let _ = writeln!(out, "  Main code file: {}", experiment.main_code_file);
        let parameters = experiment
            .formatted_parameters()
            .unwrap_or_else(|e| format!("<{}>", e));
        let _ = writeln!(out, "  Parameters: {}", parameters);
        let _ = writeln!(out, "  Parameters format: {}", experiment.parameters_format);
        if !experiment.collection.is_empty() {
            let _ = writeln!(out, "  Collection: {}", experiment.collection.join(", "));
        }
        let _ = writeln!(out, "  State: {}", experiment.state());
        if let Some(cluster) = &experiment.cluster_id {
            let _ = writeln!(out, "  Cluster: {}", cluster);
        }
        if !experiment.custom_msg.is_empty() {
            let _ = writeln!(out, "  Message: {}", experiment.custom_msg);
        }

        if experiment.state().has_output() {
            self.render_outputs(experiment, &mut out);
        }

        let _ = writeln!(
            out,
            "  Last modified: {}",
            experiment.time_modified.format(TIME_FORMAT)
        );

        if !experiment.conditions.is_empty() {
            out.push_str("  Conditions:\n");
            for condition in experiment.conditions.values() {
                let _ = writeln!(out, "    {}:", condition.name);
                let _ = writeln!(out, "      variablename: {}", condition.variable_name);
                let _ = writeln!(out, "      killvalue: {}", condition.kill_value);
                let _ = writeln!(out, "      comparator: {}", condition.comparator.as_str());
                let _ = writeln!(out, "      when: {}", condition.when);
                let _ = writeln!(out, "      action: {}", condition.action);
            }
        }

        if experiment.has_warnings() {
            out.push_str("  Warnings:\n");
            for warning in experiment.warnings() {
                let _ = writeln!(out, "    {}", warning);
            }
        }

        out
    }

    fn render_outputs(&self, experiment: &Experiment, out: &mut String) {
        let readable: Vec<&String> = experiment
            .outputs
            .iter()
            .filter(|file| self.reader.has_processor(experiment, file))
            .collect();
        if readable.is_empty() {
            return;
        }

        out.push_str("  Output:\n");
        for file in readable {
            match self.reader.read(experiment, file) {
                Ok(data) => {
                    let _ = writeln!(out, "    {}:", file);
                    for (field, value) in data {
                        let _ = writeln!(out, "      {}: {}", field, value);
                    }
                }
                Err(e) => debug!("Skipping unreadable output: {}", e),
            }
        }
    }
}
