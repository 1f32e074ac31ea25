// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{NeronetError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub definitions: DefinitionConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefinitionConfig {
    pub config_file_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub stop_on_kill: bool,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("NERONET")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| NeronetError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| NeronetError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: PathBuf::from(".neronet"),
                database_file: "experiments.json".to_string(),
            },
            definitions: DefinitionConfig {
                config_file_name: "config.yaml".to_string(),
            },
            monitor: MonitorConfig { stop_on_kill: true },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.storage.database_file.trim().is_empty() {
            return Err(NeronetError::Config(
                "database_file must not be empty".to_string(),
            ));
        }

        if self.definitions.config_file_name.trim().is_empty() {
            return Err(NeronetError::Config(
                "config_file_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.storage.database_path(),
            PathBuf::from(".neronet/experiments.json")
        );
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("neronet.toml");
        fs::write(
            &path,
            r#"
[storage]
data_dir = "/tmp/neronet-data"
database_file = "db.json"

[definitions]
config_file_name = "experiments.yaml"

[monitor]
stop_on_kill = false
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/neronet-data"));
        assert_eq!(config.definitions.config_file_name, "experiments.yaml");
        assert!(!config.monitor.stop_on_kill);
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let mut config = Config::default_config();
        config.storage.database_file = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
