// file: src/utils/validation.rs
// description: data validation utilities and helpers
// reference: input validation patterns

use crate::error::{NeronetError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref EXPERIMENT_ID: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("EXPERIMENT_ID regex is valid");
}

pub struct Validator;

impl Validator {
    pub fn validate_experiment_id(id: &str) -> Result<()> {
        if !EXPERIMENT_ID.is_match(id) {
            return Err(NeronetError::Validation(format!(
                "Invalid experiment id '{}': use letters, digits, '_', '-' or '.'",
                id
            )));
        }
        Ok(())
    }

    /// A bare file name: no separators, not `.` or `..`.
    pub fn validate_file_name(name: &str) -> Result<()> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(NeronetError::Validation(format!(
                "Invalid file name '{}': must not contain path separators",
                name
            )));
        }
        Ok(())
    }

    pub fn validate_file_path(path: &Path) -> Result<()> {
        let canonical = fs::canonicalize(path).map_err(|e| {
            NeronetError::Validation(format!(
                "Cannot canonicalize path {}: {}",
                path.display(),
                e
            ))
        })?;

        if !canonical.is_file() {
            return Err(NeronetError::Validation(format!(
                "Path is not a file: {}",
                canonical.display()
            )));
        }

        Ok(())
    }

    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(NeronetError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(NeronetError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_within_base_dir(path: &Path, base_dir: &Path) -> Result<()> {
        let canonical_path = fs::canonicalize(path).map_err(|e| {
            NeronetError::Validation(format!(
                "Cannot canonicalize path {}: {}",
                path.display(),
                e
            ))
        })?;

        let canonical_base = fs::canonicalize(base_dir).map_err(|e| {
            NeronetError::Validation(format!(
                "Cannot canonicalize base dir {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        if !canonical_path.starts_with(&canonical_base) {
            return Err(NeronetError::Validation(format!(
                "Path traversal detected ({} outside {})",
                canonical_path.display(),
                canonical_base.display()
            )));
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
    fn test_validate_experiment_id() {
        assert!(Validator::validate_experiment_id("lr_0.01-run2").is_ok());
        assert!(Validator::validate_experiment_id("").is_err());
        assert!(Validator::validate_experiment_id("-flag").is_err());
        assert!(Validator::validate_experiment_id("a b").is_err());
        assert!(Validator::validate_experiment_id("../escape").is_err());
    }

    #[test]
    fn test_validate_file_name() {
        assert!(Validator::validate_file_name("loss.svg").is_ok());
        assert!(Validator::validate_file_name("..hidden").is_ok());
        assert!(Validator::validate_file_name("").is_err());
        assert!(Validator::validate_file_name("..").is_err());
        assert!(Validator::validate_file_name("../../../x.svg").is_err());
        assert!(Validator::validate_file_name("plots/x.svg").is_err());
        assert!(Validator::validate_file_name("plots\\x.svg").is_err());
    }

    #[test]
    fn test_validate_file_path() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("log.txt");
        fs::write(&file_path, "loss 1").unwrap();

        assert!(Validator::validate_file_path(&file_path).is_ok());
        assert!(Validator::validate_file_path(temp.path()).is_err());
        assert!(Validator::validate_file_path(Path::new("/nonexistent")).is_err());
    }

    #[test]
    fn test_validate_directory() {
        let temp = TempDir::new().unwrap();
        assert!(Validator::validate_directory(temp.path()).is_ok());
        assert!(Validator::validate_directory(Path::new("/nonexistent")).is_err());
    }

    #[test]
    fn test_validate_within_base_dir() {
        let base = TempDir::new().unwrap();
        let file_path = base.path().join("results/log.txt");
        std::fs::create_dir_all(file_path.parent().unwrap()).unwrap();
        std::fs::write(&file_path, "loss 1").unwrap();

        assert!(Validator::validate_within_base_dir(&file_path, base.path()).is_ok());

        let outside = TempDir::new().unwrap();
        let outside_file = outside.path().join("log.txt");
        std::fs::write(&outside_file, "loss 1").unwrap();

        assert!(Validator::validate_within_base_dir(&outside_file, base.path()).is_err());
    }
}
