// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NeronetError>;

#[derive(Error, Debug)]
pub enum NeronetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Definition error in {}: {message}", file.display())]
    Definition { file: PathBuf, message: String },

    #[error("Parameter format error: {0}")]
    Format(String),

    #[error("{experiment}: {message}")]
    OutputRead { experiment: String, message: String },

    #[error("{experiment}: {message}")]
    Plot { experiment: String, message: String },

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("Experiment already exists: {0}")]
    DuplicateExperiment(String),

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl NeronetError {
    pub fn output_read(experiment: &str, message: impl Into<String>) -> Self {
        NeronetError::OutputRead {
            experiment: experiment.to_string(),
            message: message.into(),
        }
    }

    pub fn plot(experiment: &str, message: impl Into<String>) -> Self {
        NeronetError::Plot {
            experiment: experiment.to_string(),
            message: message.into(),
        }
    }
}
