// file: src/output/reader.rs
// description: reads experiment output files through their configured processors
// reference: internal output handling

use crate::error::{NeronetError, Result};
use crate::models::Experiment;
use crate::output::processor::ProcessorRegistry;
use crate::parser::CallSpec;
use crate::utils::Validator;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Output data keyed by variable name.
pub type OutputData = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessorKind {
    File,
    Line,
}

impl ProcessorKind {
    fn field(&self) -> &'static str {
        match self {
            ProcessorKind::File => "output_file_processor",
            ProcessorKind::Line => "output_line_processor",
        }
    }

    fn specs<'a>(&self, experiment: &'a Experiment) -> &'a BTreeMap<String, String> {
        match self {
            ProcessorKind::File => &experiment.output_file_processor,
            ProcessorKind::Line => &experiment.output_line_processor,
        }
    }
}

#[derive(Clone)]
pub struct OutputReader {
    registry: Arc<ProcessorRegistry>,
    data_dir: PathBuf,
}

impl OutputReader {
    pub fn new(registry: Arc<ProcessorRegistry>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn has_processor(&self, experiment: &Experiment, filename: &str) -> bool {
        [ProcessorKind::File, ProcessorKind::Line]
            .iter()
            .any(|kind| kind.specs(experiment).contains_key(filename))
    }

    /// Whole-file processors take precedence over line processors.
    pub fn read(&self, experiment: &Experiment, filename: &str) -> Result<OutputData> {
        let id = experiment.id.as_str();

        for kind in [ProcessorKind::File, ProcessorKind::Line] {
            let Some(spec) = kind.specs(experiment).get(filename) else {
                continue;
            };

            let call = CallSpec::parse(spec).ok_or_else(|| {
                NeronetError::output_read(id, format!("couldn't parse {} arguments", kind.field()))
            })?;

            let results_dir = experiment.results_dir(&self.data_dir);
            let path = results_dir.join(filename);
            if !path.is_file() {
                return Err(NeronetError::output_read(
                    id,
                    format!("couldn't open {}: no such file", path.display()),
                ));
            }
            Validator::validate_within_base_dir(&path, &results_dir)
                .map_err(|e| NeronetError::output_read(id, e.to_string()))?;
            let content = fs::read_to_string(&path).map_err(|e| {
                NeronetError::output_read(id, format!("couldn't open {}: {}", path.display(), e))
            })?;
            debug!("{}: reading {} with {}", id, path.display(), call.key());

            let data = match kind {
                ProcessorKind::File => self.read_file(id, filename, &call, &content)?,
                ProcessorKind::Line => self.read_lines(id, filename, &call, &content)?,
            };

            if data.is_empty() {
                return Err(NeronetError::output_read(
                    id,
                    format!("no output data found in {}", filename),
                ));
            }
            return Ok(data);
        }

        Err(NeronetError::output_read(
            id,
            format!("no output processor defined for {}", filename),
        ))
    }

    fn read_file(
        &self,
        id: &str,
        filename: &str,
        call: &CallSpec,
        content: &str,
    ) -> Result<OutputData> {
        let processor = self.registry.file(&call.key()).ok_or_else(|| {
            NeronetError::output_read(
                id,
                format!("couldn't import {} from {}", call.function, call.module),
            )
        })?;

        let value = processor.process_file(content, &call.args).map_err(|e| {
            NeronetError::output_read(
                id,
                format!("couldn't read {} with {}: {}", filename, call.function, e),
            )
        })?;

        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(NeronetError::output_read(
                id,
                format!("output_file_processor for {} didn't return a mapping", filename),
            )),
        }
    }

    fn read_lines(
        &self,
        id: &str,
        filename: &str,
        call: &CallSpec,
        content: &str,
    ) -> Result<OutputData> {
        let processor = self.registry.line(&call.key()).ok_or_else(|| {
            NeronetError::output_read(
                id,
                format!("couldn't import {} from {}", call.function, call.module),
            )
        })?;

        let mut series: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for line in content.lines() {
            let record = processor.process_line(line, &call.args).map_err(|e| {
                NeronetError::output_read(
                    id,
                    format!("couldn't read {} with {}: {}", filename, call.function, e),
                )
            })?;
            for (key, value) in record {
                series.entry(key).or_default().push(value);
            }
        }

        Ok(series
            .into_iter()
            .map(|(key, values)| (key, Value::Array(values)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExperimentState;
    use serde_json::json;
    use tempfile::TempDir;

    fn experiment_with(
        line: &[(&str, &str)],
        file: &[(&str, &str)],
    ) -> Experiment {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>()
        };
        Experiment::builder("exp1", "python3", "train.py", "/tmp/project")
            .outputs(vec!["log.txt".to_string(), "summary.json".to_string()])
            .output_line_processor(to_map(line))
            .output_file_processor(to_map(file))
            .build()
    }

    fn write_results(data_dir: &Path, name: &str, content: &str) {
        let dir = data_dir.join("results").join("exp1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    fn reader(data_dir: &Path) -> OutputReader {
        OutputReader::new(Arc::new(ProcessorRegistry::default()), data_dir)
    }

    #[test]
    fn test_line_processor_collects_series() {
        let temp = TempDir::new().unwrap();
        write_results(temp.path(), "log.txt", "loss 0.9\nstarting epoch\nloss 0.5\nacc 0.7\n");
        let exp = experiment_with(&[("log.txt", "neronet.processors key_value")], &[]);

        let data = reader(temp.path()).read(&exp, "log.txt").unwrap();
        assert_eq!(data["loss"], json!([0.9, 0.5]));
        assert_eq!(data["acc"], json!([0.7]));
    }

    #[test]
    fn test_file_processor_preferred() {
        let temp = TempDir::new().unwrap();
        write_results(temp.path(), "summary.json", r#"{"best": 0.93}"#);
        let exp = experiment_with(
            &[("summary.json", "neronet.processors key_value")],
            &[("summary.json", "neronet.processors json")],
        );

        let data = reader(temp.path()).read(&exp, "summary.json").unwrap();
        assert_eq!(data["best"], json!(0.93));
    }

    #[test]
    fn test_finished_experiment_reads_run_results() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("archive");
        fs::create_dir_all(&archive).unwrap();
        fs::write(archive.join("log.txt"), "loss 1\n").unwrap();

        let mut exp = experiment_with(&[("log.txt", "neronet.processors key_value")], &[]);
        exp.run_results.push(archive);
        exp.update_state(ExperimentState::Finished);

        let data = reader(temp.path()).read(&exp, "log.txt").unwrap();
        assert_eq!(data["loss"], json!([1]));
    }

    #[test]
    fn test_no_processor_defined() {
        let temp = TempDir::new().unwrap();
        write_results(temp.path(), "log.txt", "loss 1\n");
        let exp = experiment_with(&[], &[]);

        let err = reader(temp.path()).read(&exp, "log.txt").unwrap_err();
        assert_eq!(err.to_string(), "exp1: no output processor defined for log.txt");
    }

    #[test]
    fn test_unparsable_processor() {
        let temp = TempDir::new().unwrap();
        write_results(temp.path(), "log.txt", "loss 1\n");
        let exp = experiment_with(&[("log.txt", "lonely")], &[]);

        let err = reader(temp.path()).read(&exp, "log.txt").unwrap_err();
        assert_eq!(
            err.to_string(),
            "exp1: couldn't parse output_line_processor arguments"
        );
    }

    #[test]
    fn test_unknown_processor() {
        let temp = TempDir::new().unwrap();
        write_results(temp.path(), "log.txt", "loss 1\n");
        let exp = experiment_with(&[("log.txt", "my.module reader")], &[]);

        let err = reader(temp.path()).read(&exp, "log.txt").unwrap_err();
        assert_eq!(err.to_string(), "exp1: couldn't import reader from my.module");
    }

    #[test]
    fn test_log_without_data() {
        let temp = TempDir::new().unwrap();
        write_results(temp.path(), "log.txt", "nothing useful\nstill starting up\n");
        let exp = experiment_with(&[("log.txt", "neronet.processors key_value")], &[]);

        let err = reader(temp.path()).read(&exp, "log.txt").unwrap_err();
        assert_eq!(err.to_string(), "exp1: no output data found in log.txt");
    }

    #[test]
    fn test_file_processor_not_mapping() {
        let temp = TempDir::new().unwrap();
        write_results(temp.path(), "summary.json", "[1, 2]");
        let exp = experiment_with(&[], &[("summary.json", "neronet.processors json")]);

        let err = reader(temp.path()).read(&exp, "summary.json").unwrap_err();
        assert_eq!(
            err.to_string(),
            "exp1: output_file_processor for summary.json didn't return a mapping"
        );
    }

    #[test]
    fn test_processor_failure() {
        let temp = TempDir::new().unwrap();
        write_results(temp.path(), "summary.json", "not json");
        let exp = experiment_with(&[], &[("summary.json", "neronet.processors json")]);

        let err = reader(temp.path()).read(&exp, "summary.json").unwrap_err();
        assert!(err.to_string().starts_with("exp1: couldn't read summary.json with json: "));
    }

    #[test]
    fn test_missing_output_file() {
        let temp = TempDir::new().unwrap();
        let exp = experiment_with(&[("missing.txt", "neronet.processors key_value")], &[]);

        let err = reader(temp.path()).read(&exp, "missing.txt").unwrap_err();
        let expected = format!(
            "exp1: couldn't open {}: no such file",
            temp.path().join("results/exp1/missing.txt").display()
        );
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_path_escape_rejected() {
        let temp = TempDir::new().unwrap();
        write_results(temp.path(), "log.txt", "loss 1\n");
        fs::write(temp.path().join("secret.txt"), "loss 2\n").unwrap();

        let exp = experiment_with(&[("../../secret.txt", "neronet.processors key_value")], &[]);
        assert!(reader(temp.path()).read(&exp, "../../secret.txt").is_err());
    }
}
