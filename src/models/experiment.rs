// file: src/models/experiment.rs
// description: experiment model with state history, conditions and warnings
// reference: internal data structures

use crate::error::Result;
use crate::models::condition::{Condition, ConditionAction};
use crate::models::parameters::{Parameters, format_parameters};
use crate::models::state::{ExperimentState, StateRecord};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Fields every experiment definition must provide.
pub const MANDATORY_FIELDS: [&str; 2] = ["run_command_prefix", "main_code_file"];

/// Fields an experiment definition may provide.
pub const OPTIONAL_FIELDS: [&str; 11] = [
    "parameters",
    "parameters_format",
    "outputs",
    "output_line_processor",
    "output_file_processor",
    "plot",
    "collection",
    "required_files",
    "conditions",
    "sbatch_args",
    "custom_msg",
];

/// Fields maintained by neronet itself and never read from a definition.
pub const AUTOMATIC_FIELDS: [&str; 6] = [
    "path",
    "time_created",
    "time_modified",
    "states_info",
    "cluster_id",
    "warnings",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub run_command_prefix: String,
    pub main_code_file: String,
    pub path: PathBuf,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub parameters_format: String,
    #[serde(default)]
    pub required_files: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub output_line_processor: BTreeMap<String, String>,
    #[serde(default)]
    pub output_file_processor: BTreeMap<String, String>,
    #[serde(default)]
    pub plot: BTreeMap<String, String>,
    #[serde(default)]
    pub collection: Vec<String>,
    #[serde(default)]
    pub conditions: BTreeMap<String, Condition>,
    pub sbatch_args: Option<String>,
    #[serde(default)]
    pub custom_msg: String,
    pub time_created: DateTime<Local>,
    pub time_modified: DateTime<Local>,
    #[serde(default)]
    pub run_results: Vec<PathBuf>,
    pub states_info: Vec<StateRecord>,
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Experiment {
    pub fn builder(
        id: impl Into<String>,
        run_command_prefix: impl Into<String>,
        main_code_file: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> ExperimentBuilder {
        ExperimentBuilder::new(id, run_command_prefix, main_code_file, path)
    }

    pub fn state(&self) -> ExperimentState {
        self.state_info()
            .map(|record| record.state)
            .unwrap_or(ExperimentState::Defined)
    }

    pub fn state_info(&self) -> Option<&StateRecord> {
        self.states_info.last()
    }

    pub fn update_state(&mut self, state: ExperimentState) {
        self.update_state_at(state, Local::now());
    }

    pub fn update_state_at(&mut self, state: ExperimentState, now: DateTime<Local>) {
        if state == self.state() {
            return;
        }
        if state == ExperimentState::Running {
            for condition in self.conditions.values_mut() {
                condition.restart(now);
            }
        }
        self.states_info.push(StateRecord::new(state, now));
    }

    pub fn formatted_parameters(&self) -> Result<String> {
        format_parameters(&self.parameters_format, &self.parameters)
    }

    /// Shell command line that runs the experiment.
    pub fn callstring(&self) -> Result<String> {
        let parameters = self.formatted_parameters()?;
        let parts = [
            self.run_command_prefix.as_str(),
            self.main_code_file.as_str(),
            parameters.as_str(),
        ];
        Ok(parts
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" "))
    }

    pub fn action_for(&self, logrow: &str) -> Option<(ConditionAction, String)> {
        self.action_for_at(logrow, Local::now())
    }

    /// A kill short-circuits; otherwise the last triggered action wins.
    pub fn action_for_at(
        &self,
        logrow: &str,
        now: DateTime<Local>,
    ) -> Option<(ConditionAction, String)> {
        let mut found = None;
        for (key, condition) in &self.conditions {
            match condition.evaluate(logrow, now) {
                Some(ConditionAction::Kill) => return Some((ConditionAction::Kill, key.clone())),
                Some(action) => found = Some((action, key.clone())),
                None => {}
            }
        }
        found
    }

    pub fn set_warning(&mut self, condition_name: &str) {
        self.warnings.push(format!(
            "{}: The condition '{}' was met",
            Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
            condition_name
        ));
    }

    pub fn set_warnings(&mut self, warnings: Vec<String>) {
        self.warnings = warnings;
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Directory holding the latest results of this experiment.
    pub fn results_dir(&self, data_dir: &Path) -> PathBuf {
        if self.state() == ExperimentState::Finished
            && let Some(latest) = self.run_results.last()
        {
            return latest.clone();
        }
        data_dir.join("results").join(&self.id)
    }

    /// Copies the definable fields into a fresh experiment.
    pub fn duplicate(&self, new_id: impl Into<String>) -> Experiment {
        let mut builder = Experiment::builder(
            new_id,
            self.run_command_prefix.clone(),
            self.main_code_file.clone(),
            self.path.clone(),
        )
        .parameters(self.parameters.clone())
        .parameters_format(self.parameters_format.clone())
        .required_files(self.required_files.clone())
        .outputs(self.outputs.clone())
        .output_line_processor(self.output_line_processor.clone())
        .output_file_processor(self.output_file_processor.clone())
        .plot(self.plot.clone())
        .collection(self.collection.clone())
        .conditions(self.conditions.clone())
        .custom_msg(self.custom_msg.clone());

        if let Some(args) = &self.sbatch_args {
            builder = builder.sbatch_args(args.clone());
        }

        builder.build()
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.state())
    }
}

pub struct ExperimentBuilder {
    id: String,
    run_command_prefix: String,
    main_code_file: String,
    path: PathBuf,
    parameters: Parameters,
    parameters_format: String,
    required_files: Vec<String>,
    outputs: Vec<String>,
    output_line_processor: BTreeMap<String, String>,
    output_file_processor: BTreeMap<String, String>,
    plot: BTreeMap<String, String>,
    collection: Vec<String>,
    conditions: BTreeMap<String, Condition>,
    sbatch_args: Option<String>,
    custom_msg: String,
}

impl ExperimentBuilder {
    pub fn new(
        id: impl Into<String>,
        run_command_prefix: impl Into<String>,
        main_code_file: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            run_command_prefix: run_command_prefix.into(),
            main_code_file: main_code_file.into(),
            path: path.into(),
            parameters: Parameters::new(),
            parameters_format: String::new(),
            required_files: Vec::new(),
            outputs: Vec::new(),
            output_line_processor: BTreeMap::new(),
            output_file_processor: BTreeMap::new(),
            plot: BTreeMap::new(),
            collection: Vec::new(),
            conditions: BTreeMap::new(),
            sbatch_args: None,
            custom_msg: String::new(),
        }
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn parameters_format(mut self, format: String) -> Self {
        self.parameters_format = format;
        self
    }

    pub fn required_files(mut self, files: Vec<String>) -> Self {
        self.required_files = files;
        self
    }

    pub fn outputs(mut self, outputs: Vec<String>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn output_line_processor(mut self, processors: BTreeMap<String, String>) -> Self {
        self.output_line_processor = processors;
        self
    }

    pub fn output_file_processor(mut self, processors: BTreeMap<String, String>) -> Self {
        self.output_file_processor = processors;
        self
    }

    pub fn plot(mut self, plots: BTreeMap<String, String>) -> Self {
        self.plot = plots;
        self
    }

    pub fn collection(mut self, collection: Vec<String>) -> Self {
        self.collection = collection;
        self
    }

    pub fn conditions(mut self, conditions: BTreeMap<String, Condition>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn sbatch_args(mut self, args: String) -> Self {
        self.sbatch_args = Some(args);
        self
    }

    pub fn custom_msg(mut self, message: String) -> Self {
        self.custom_msg = message;
        self
    }

    pub fn build(self) -> Experiment {
        let now = Local::now();
        let collection = if self.collection.is_empty() {
            let folder = self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            vec![folder]
        } else {
            self.collection
        };

        Experiment {
            id: self.id,
            run_command_prefix: self.run_command_prefix,
            main_code_file: self.main_code_file,
            path: self.path,
            parameters: self.parameters,
            parameters_format: self.parameters_format,
            required_files: self.required_files,
            outputs: self.outputs,
            output_line_processor: self.output_line_processor,
            output_file_processor: self.output_file_processor,
            plot: self.plot,
            collection,
            conditions: self.conditions,
            sbatch_args: self.sbatch_args,
            custom_msg: self.custom_msg,
            time_created: now,
            time_modified: now,
            run_results: Vec::new(),
            states_info: vec![StateRecord::new(ExperimentState::Defined, now)],
            cluster_id: None,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::condition::{Comparator, Trigger};
    use crate::models::parameters::ParameterValue;
    use chrono::Duration;

    fn experiment() -> Experiment {
        let mut parameters = Parameters::new();
        parameters.insert("lr".to_string(), ParameterValue::Float(0.1));
        parameters.insert("epochs".to_string(), ParameterValue::Integer(5));

        let mut conditions = BTreeMap::new();
        conditions.insert(
            "diverged".to_string(),
            Condition::new("diverged", "loss", 10.0, Comparator::Gt, Trigger::Immediately, ConditionAction::Kill),
        );
        conditions.insert(
            "slow".to_string(),
            Condition::new("slow", "loss", 1.0, Comparator::Gt, Trigger::Immediately, ConditionAction::Warn),
        );

        Experiment::builder("lr_test", "python3", "train.py", "/home/user/mnist")
            .parameters(parameters)
            .parameters_format("--lr {lr} --epochs {epochs}".to_string())
            .conditions(conditions)
            .build()
    }

    #[test]
    fn test_defaults() {
        let exp = experiment();
        assert_eq!(exp.state(), ExperimentState::Defined);
        assert_eq!(exp.collection, vec!["mnist".to_string()]);
        assert!(exp.cluster_id.is_none());
        assert!(!exp.has_warnings());
        assert_eq!(exp.to_string(), "lr_test defined");
    }

    #[test]
    fn test_callstring() {
        let exp = experiment();
        assert_eq!(exp.callstring().unwrap(), "python3 train.py --lr 0.1 --epochs 5");

        let bare = Experiment::builder("bare", "python3", "run.py", "/tmp/bare").build();
        assert_eq!(bare.callstring().unwrap(), "python3 run.py");
    }

    #[test]
    fn test_update_state_skips_repeats() {
        let mut exp = experiment();
        exp.update_state(ExperimentState::Defined);
        assert_eq!(exp.states_info.len(), 1);

        exp.update_state(ExperimentState::Submitted);
        exp.update_state(ExperimentState::Submitted);
        assert_eq!(exp.states_info.len(), 2);
        assert_eq!(exp.state(), ExperimentState::Submitted);
    }

    #[test]
    fn test_running_restarts_condition_clocks() {
        let mut exp = experiment();
        let later = Local::now() + Duration::minutes(30);
        exp.update_state_at(ExperimentState::Running, later);

        for condition in exp.conditions.values() {
            assert_eq!(condition.start_time, later);
        }
        assert_eq!(exp.state_info().unwrap().timestamp, later);
    }

    #[test]
    fn test_kill_takes_priority() {
        let exp = experiment();
        assert_eq!(
            exp.action_for("loss 50"),
            Some((ConditionAction::Kill, "diverged".to_string()))
        );
        assert_eq!(
            exp.action_for("loss 5"),
            Some((ConditionAction::Warn, "slow".to_string()))
        );
        assert_eq!(exp.action_for("loss 0.5"), None);
    }

    #[test]
    fn test_warnings() {
        let mut exp = experiment();
        exp.set_warning("slow");
        assert!(exp.has_warnings());
        assert!(exp.warnings()[0].ends_with("The condition 'slow' was met"));

        exp.set_warnings(vec![]);
        assert!(!exp.has_warnings());
    }

    #[test]
    fn test_results_dir() {
        let mut exp = experiment();
        let data_dir = Path::new("/data");
        assert_eq!(exp.results_dir(data_dir), PathBuf::from("/data/results/lr_test"));

        exp.run_results.push(PathBuf::from("/archive/run1"));
        assert_eq!(exp.results_dir(data_dir), PathBuf::from("/data/results/lr_test"));

        exp.update_state(ExperimentState::Finished);
        assert_eq!(exp.results_dir(data_dir), PathBuf::from("/archive/run1"));
    }

    #[test]
    fn test_duplicate_resets_runtime_fields() {
        let mut exp = experiment();
        exp.update_state(ExperimentState::Running);
        exp.set_warning("slow");
        exp.cluster_id = Some("triton".to_string());

        let copy = exp.duplicate("lr_test_2");
        assert_eq!(copy.id, "lr_test_2");
        assert_eq!(copy.state(), ExperimentState::Defined);
        assert!(copy.warnings.is_empty());
        assert!(copy.cluster_id.is_none());
        assert_eq!(copy.parameters, exp.parameters);
        assert_eq!(copy.conditions, exp.conditions);
        assert_eq!(copy.path, exp.path);
    }
}
