// file: src/store/persistence.rs
// description: Persistent storage for defined experiments
// reference: json file backed experiment database

use crate::error::{NeronetError, Result};
use crate::models::Experiment;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub struct ExperimentStore {
    storage_path: PathBuf,
    experiments: BTreeMap<String, Experiment>,
}

impl ExperimentStore {
    pub async fn open(storage_path: PathBuf) -> Result<Self> {
        if let Some(parent) = storage_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|source| {
                NeronetError::FileOperation {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        let mut store = Self {
            storage_path,
            experiments: BTreeMap::new(),
        };

        store.load().await?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    pub async fn load(&mut self) -> Result<()> {
        if !self.storage_path.exists() {
            debug!("No experiment database found at {:?}", self.storage_path);
            return Ok(());
        }

        let contents = fs::read_to_string(&self.storage_path)
            .await
            .map_err(|source| NeronetError::FileOperation {
                path: self.storage_path.clone(),
                source,
            })?;

        self.experiments = serde_json::from_str(&contents)?;

        info!("Loaded {} experiments", self.experiments.len());
        Ok(())
    }

    /// Replaces the database file through a sibling temp file.
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.experiments)?;

        let tmp_path = self.storage_path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)
            .await
            .map_err(|source| NeronetError::FileOperation {
                path: tmp_path.clone(),
                source,
            })?;
        fs::rename(&tmp_path, &self.storage_path)
            .await
            .map_err(|source| NeronetError::FileOperation {
                path: self.storage_path.clone(),
                source,
            })?;

        debug!("Saved {} experiments", self.experiments.len());
        Ok(())
    }

    pub fn insert(&mut self, experiment: Experiment) -> Result<()> {
        if self.experiments.contains_key(&experiment.id) {
            return Err(NeronetError::DuplicateExperiment(experiment.id));
        }
        self.experiments.insert(experiment.id.clone(), experiment);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Experiment> {
        self.experiments
            .remove(id)
            .ok_or_else(|| NeronetError::ExperimentNotFound(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Result<&Experiment> {
        self.experiments
            .get(id)
            .ok_or_else(|| NeronetError::ExperimentNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Experiment> {
        self.experiments
            .get_mut(id)
            .ok_or_else(|| NeronetError::ExperimentNotFound(id.to_string()))
    }

    pub fn list(&self) -> impl Iterator<Item = &Experiment> {
        self.experiments.values()
    }

    /// Experiments grouped by collection name. An experiment appears once
    /// under every collection it belongs to.
    pub fn by_collection(&self) -> BTreeMap<&str, Vec<&Experiment>> {
        let mut groups: BTreeMap<&str, Vec<&Experiment>> = BTreeMap::new();
        for experiment in self.experiments.values() {
            for collection in &experiment.collection {
                groups.entry(collection.as_str()).or_default().push(experiment);
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExperimentState;
    use tempfile::tempdir;

    fn experiment(id: &str, collection: &[&str]) -> Experiment {
        Experiment::builder(id, "python3", "train.py", "/tmp/project")
            .collection(collection.iter().map(|c| c.to_string()).collect())
            .build()
    }

    #[tokio::test]
    async fn test_store_persistence() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("nested").join("experiments.json");

        {
            let mut store = ExperimentStore::open(store_path.clone()).await.unwrap();
            let mut exp = experiment("exp1", &[]);
            exp.update_state(ExperimentState::Running);
            exp.set_warning("diverged");
            store.insert(exp).unwrap();
            store.save().await.unwrap();
        }

        {
            let store = ExperimentStore::open(store_path).await.unwrap();
            assert_eq!(store.len(), 1);
            let exp = store.get("exp1").unwrap();
            assert_eq!(exp.state(), ExperimentState::Running);
            assert_eq!(exp.states_info.len(), 2);
            assert_eq!(exp.warnings.len(), 1);
            assert_eq!(exp.collection, vec!["project".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let dir = tempdir().unwrap();
        let mut store = ExperimentStore::open(dir.path().join("db.json")).await.unwrap();
        assert!(store.is_empty());

        store.insert(experiment("a", &[])).unwrap();
        assert!(matches!(
            store.insert(experiment("a", &[])),
            Err(NeronetError::DuplicateExperiment(_))
        ));

        assert!(store.remove("a").is_ok());
        assert!(matches!(store.get("a"), Err(NeronetError::ExperimentNotFound(_))));
        assert!(store.remove("a").is_err());
    }

    #[tokio::test]
    async fn test_by_collection() {
        let dir = tempdir().unwrap();
        let mut store = ExperimentStore::open(dir.path().join("db.json")).await.unwrap();
        store.insert(experiment("a", &["mnist", "baseline"])).unwrap();
        store.insert(experiment("b", &["mnist"])).unwrap();

        let groups = store.by_collection();
        assert_eq!(groups["mnist"].len(), 2);
        assert_eq!(groups["baseline"].len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_database_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(ExperimentStore::open(path).await.is_err());
    }
}
