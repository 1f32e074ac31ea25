// file: src/parser/definition.rs
// description: experiment definitions from a folder's YAML config file
// reference: https://docs.rs/yaml-rust

use crate::config::DefinitionConfig;
use crate::error::{NeronetError, Result};
use crate::models::{
    AUTOMATIC_FIELDS, CONDITION_FIELDS, Condition, Experiment, MANDATORY_FIELDS,
    OPTIONAL_FIELDS, ParameterValue, Parameters, placeholder_names,
};
use crate::utils::Validator;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use yaml_rust::yaml::Hash;
use yaml_rust::{Yaml, YamlLoader};

type FieldSet = BTreeMap<String, Yaml>;

/// Reads experiment definitions.
///
/// Keys naming an experiment field set that field. Any other key mapping to
/// a hash defines a child experiment which inherits every field set above
/// it; `parameters` are merged key by key. Only leaves become experiments.
/// A file without children defines a single experiment named after its
/// folder.
pub struct DefinitionParser {
    config_file_name: String,
}

impl DefinitionParser {
    pub fn new(config: &DefinitionConfig) -> Self {
        Self {
            config_file_name: config.config_file_name.clone(),
        }
    }

    pub fn parse_folder(&self, folder: &Path) -> Result<Vec<Experiment>> {
        Validator::validate_directory(folder)?;
        let file = folder.join(&self.config_file_name);
        let content = fs::read_to_string(&file).map_err(|source| NeronetError::FileOperation {
            path: file.clone(),
            source,
        })?;
        info!("Reading experiment definitions from {}", file.display());
        self.parse_str(&content, folder)
    }

    /// Definition errors name `<folder>/<config file name>`.
    pub fn parse_str(&self, content: &str, folder: &Path) -> Result<Vec<Experiment>> {
        self.parse_definitions(content, folder)
            .map_err(|error| match error {
                NeronetError::Definition { message, .. } => NeronetError::Definition {
                    file: folder.join(&self.config_file_name),
                    message,
                },
                other => other,
            })
    }

    fn parse_definitions(&self, content: &str, folder: &Path) -> Result<Vec<Experiment>> {
        let docs = YamlLoader::load_from_str(content)
            .map_err(|e| self.error(format!("YAML parse error: {}", e)))?;

        let root = match docs.first() {
            Some(Yaml::Hash(hash)) => hash,
            Some(_) => return Err(self.error("top level must be a mapping")),
            None => return Err(self.error("no experiments defined")),
        };

        let mut leaves = Vec::new();
        self.collect(root, &FieldSet::new(), None, &mut leaves)?;

        let mut seen = HashSet::new();
        let mut experiments = Vec::with_capacity(leaves.len());
        for (id, fields) in leaves {
            let id = match id {
                Some(id) => id,
                None => folder
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .ok_or_else(|| self.error("cannot name experiment after folder"))?,
            };
            if !seen.insert(id.clone()) {
                return Err(self.error(format!("experiment '{}' defined twice", id)));
            }
            experiments.push(self.build(&id, &fields, folder)?);
        }

        info!("Parsed {} experiment definitions", experiments.len());
        Ok(experiments)
    }

    fn collect(
        &self,
        node: &Hash,
        inherited: &FieldSet,
        id: Option<String>,
        leaves: &mut Vec<(Option<String>, FieldSet)>,
    ) -> Result<()> {
        let mut fields = inherited.clone();
        let mut children = Vec::new();

        for (key, value) in node {
            let key = key
                .as_str()
                .ok_or_else(|| self.error(format!("non-string key {:?}", key)))?;

            if AUTOMATIC_FIELDS.contains(&key) {
                return Err(self.error(format!("'{}' is set automatically", key)));
            }

            if MANDATORY_FIELDS.contains(&key) || OPTIONAL_FIELDS.contains(&key) {
                if key == "parameters" {
                    merge_parameters(&mut fields, value);
                } else {
                    fields.insert(key.to_string(), value.clone());
                }
            } else if let Yaml::Hash(child) = value {
                children.push((key.to_string(), child));
            } else {
                return Err(self.error(format!("unknown field '{}'", key)));
            }
        }

        if children.is_empty() {
            debug!("Found experiment definition {:?}", id);
            leaves.push((id, fields));
            return Ok(());
        }

        for (child_id, child) in children {
            self.collect(child, &fields, Some(child_id), leaves)?;
        }
        Ok(())
    }

    fn build(&self, id: &str, fields: &FieldSet, folder: &Path) -> Result<Experiment> {
        Validator::validate_experiment_id(id)?;

        let mandatory = |name: &str| -> Result<String> {
            fields
                .get(name)
                .and_then(scalar_string)
                .ok_or_else(|| self.error(format!("{}: missing mandatory field '{}'", id, name)))
        };

        let parameters = match fields.get("parameters") {
            Some(value) => self.parameters(id, value)?,
            None => Parameters::new(),
        };

        let parameters_format = self.optional_string(id, fields, "parameters_format")?;
        for name in placeholder_names(&parameters_format) {
            if !parameters.contains_key(&name) {
                return Err(self.error(format!(
                    "{}: parameters_format refers to undefined parameter '{}'",
                    id, name
                )));
            }
        }

        let mut builder = Experiment::builder(
            id,
            mandatory("run_command_prefix")?,
            mandatory("main_code_file")?,
            folder,
        )
        .parameters(parameters)
        .parameters_format(parameters_format)
        .required_files(self.string_list(id, fields, "required_files")?)
        .outputs(self.string_list(id, fields, "outputs")?)
        .output_line_processor(self.string_map(id, fields, "output_line_processor")?)
        .output_file_processor(self.string_map(id, fields, "output_file_processor")?)
        .plot(self.plots(id, fields)?)
        .collection(self.string_list(id, fields, "collection")?)
        .conditions(self.conditions(id, fields)?)
        .custom_msg(self.optional_string(id, fields, "custom_msg")?);

        if fields.contains_key("sbatch_args") {
            builder = builder.sbatch_args(self.optional_string(id, fields, "sbatch_args")?);
        }

        let experiment = builder.build();

        for file in &experiment.required_files {
            if !folder.join(file).exists() {
                warn!("{}: required file {} not found in {}", id, file, folder.display());
            }
        }

        Ok(experiment)
    }

    fn parameters(&self, id: &str, value: &Yaml) -> Result<Parameters> {
        let hash = match value {
            Yaml::Hash(hash) => hash,
            Yaml::Null => return Ok(Parameters::new()),
            _ => return Err(self.error(format!("{}: parameters must be a mapping", id))),
        };

        let mut parameters = Parameters::new();
        for (key, value) in hash {
            let name = scalar_string(key)
                .ok_or_else(|| self.error(format!("{}: invalid parameter name", id)))?;
            let value = match value {
                Yaml::Boolean(b) => ParameterValue::Bool(*b),
                Yaml::Integer(i) => ParameterValue::Integer(*i),
                Yaml::Real(_) => value
                    .as_f64()
                    .map(ParameterValue::Float)
                    .ok_or_else(|| self.error(format!("{}: invalid number for '{}'", id, name)))?,
                Yaml::String(s) => ParameterValue::Text(s.clone()),
                _ => {
                    return Err(self.error(format!(
                        "{}: parameter '{}' must be a scalar",
                        id, name
                    )));
                }
            };
            parameters.insert(name, value);
        }
        Ok(parameters)
    }

    fn plots(&self, id: &str, fields: &FieldSet) -> Result<BTreeMap<String, String>> {
        let plots = self.string_map(id, fields, "plot")?;
        for name in plots.keys() {
            Validator::validate_file_name(name)
                .map_err(|e| self.error(format!("{}: plot {}", id, e)))?;
        }
        Ok(plots)
    }

    fn conditions(&self, id: &str, fields: &FieldSet) -> Result<BTreeMap<String, Condition>> {
        let hash = match fields.get("conditions") {
            Some(Yaml::Hash(hash)) => hash,
            None | Some(Yaml::Null) => return Ok(BTreeMap::new()),
            Some(_) => return Err(self.error(format!("{}: conditions must be a mapping", id))),
        };

        let mut conditions = BTreeMap::new();
        for (key, value) in hash {
            let name = scalar_string(key)
                .ok_or_else(|| self.error(format!("{}: invalid condition name", id)))?;
            let Yaml::Hash(definition) = value else {
                return Err(self.error(format!("{}: condition '{}' must be a mapping", id, name)));
            };

            for required in CONDITION_FIELDS {
                self.condition_field(id, &name, definition, required)?;
            }

            let text = |field_name: &str| -> Result<String> {
                scalar_string(self.condition_field(id, &name, definition, field_name)?)
                    .ok_or_else(|| {
                        self.error(format!(
                            "{}: condition '{}' has invalid '{}'",
                            id, name, field_name
                        ))
                    })
            };
            let kill_value = match self.condition_field(id, &name, definition, "killvalue")? {
                Yaml::Integer(i) => *i as f64,
                other => other
                    .as_f64()
                    .or_else(|| other.as_str().and_then(|s| s.trim().parse().ok()))
                    .ok_or_else(|| {
                        self.error(format!("{}: condition '{}' killvalue is not a number", id, name))
                    })?,
            };

            let condition = Condition::new(
                &name,
                &text("variablename")?,
                kill_value,
                text("comparator")?.parse()?,
                text("when")?.parse()?,
                text("action")?.parse()?,
            );
            conditions.insert(name, condition);
        }
        Ok(conditions)
    }

    fn condition_field<'a>(
        &self,
        id: &str,
        name: &str,
        definition: &'a Hash,
        field: &str,
    ) -> Result<&'a Yaml> {
        definition
            .get(&Yaml::String(field.to_string()))
            .ok_or_else(|| self.error(format!("{}: condition '{}' lacks '{}'", id, name, field)))
    }

    fn optional_string(&self, id: &str, fields: &FieldSet, name: &str) -> Result<String> {
        match fields.get(name) {
            None | Some(Yaml::Null) => Ok(String::new()),
            Some(value) => scalar_string(value)
                .ok_or_else(|| self.error(format!("{}: '{}' must be a string", id, name))),
        }
    }

    fn string_list(&self, id: &str, fields: &FieldSet, name: &str) -> Result<Vec<String>> {
        match fields.get(name) {
            None | Some(Yaml::Null) => Ok(Vec::new()),
            Some(Yaml::Array(items)) => items
                .iter()
                .map(|item| {
                    scalar_string(item).ok_or_else(|| {
                        self.error(format!("{}: '{}' must list strings", id, name))
                    })
                })
                .collect(),
            Some(value) => scalar_string(value)
                .map(|single| vec![single])
                .ok_or_else(|| self.error(format!("{}: '{}' must be a list", id, name))),
        }
    }

    fn string_map(
        &self,
        id: &str,
        fields: &FieldSet,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        match fields.get(name) {
            None | Some(Yaml::Null) => Ok(BTreeMap::new()),
            Some(Yaml::Hash(hash)) => hash
                .iter()
                .map(|(key, value)| match (scalar_string(key), scalar_string(value)) {
                    (Some(key), Some(value)) => Ok((key, value)),
                    _ => Err(self.error(format!("{}: '{}' must map strings to strings", id, name))),
                })
                .collect(),
            Some(_) => Err(self.error(format!("{}: '{}' must be a mapping", id, name))),
        }
    }

    fn error(&self, message: impl Into<String>) -> NeronetError {
        NeronetError::Definition {
            file: PathBuf::from(&self.config_file_name),
            message: message.into(),
        }
    }
}

impl Default for DefinitionParser {
    fn default() -> Self {
        Self {
            config_file_name: "config.yaml".to_string(),
        }
    }
}

fn merge_parameters(fields: &mut FieldSet, value: &Yaml) {
    let Yaml::Hash(incoming) = value else {
        fields.insert("parameters".to_string(), value.clone());
        return;
    };
    let mut merged = match fields.get("parameters") {
        Some(Yaml::Hash(existing)) => existing.clone(),
        _ => Hash::new(),
    };
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }
    fields.insert("parameters".to_string(), Yaml::Hash(merged));
}

fn scalar_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::Real(r) => Some(r.clone()),
        Yaml::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
