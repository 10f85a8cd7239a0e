//! Per-dataset vector indexes: building, persistence and the in-process registry.

pub mod builder;
pub mod store;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::IndexError;
use crate::models::DatasetInfo;

pub use builder::IndexBuilder;
pub use store::{IndexManifest, VectorHit, VectorIndex};

/// Whether an index may be loaded without a matching manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexTrust {
    /// Missing manifests and checksum mismatches are rejected.
    #[default]
    Verified,
    /// Such indexes load with `verified = false` and a warning.
    AllowUnverified,
}

/// Directory name for a dataset tag. Tags like `c++` or `c#` aren't safe path
/// components, so anything other than ASCII alphanumerics, `-` and `_` maps to
/// `_`. A short hash of the exact tag keeps tags that sanitize alike (`c#` and
/// `c_`, `C++` and `c++`) apart.
pub fn dataset_dir_name(dataset: &str) -> String {
    let readable: String = dataset
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let digest = Sha256::digest(dataset.as_bytes());
    let suffix: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("{readable}-{suffix}")
}

/// Loaded indexes, shared read-only across requests.
pub struct IndexRegistry {
    dir: PathBuf,
    dimension: usize,
    trust: IndexTrust,
    loaded: RwLock<HashMap<String, Arc<VectorIndex>>>,
}

impl IndexRegistry {
    pub fn new(dir: PathBuf, dimension: usize, trust: IndexTrust) -> Self {
        Self {
            dir,
            dimension,
            trust,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// The dataset's index, loading it from disk on first use.
    pub fn get(&self, dataset: &str) -> Result<Arc<VectorIndex>, IndexError> {
        if let Some(index) = self.loaded.read().get(dataset) {
            return Ok(Arc::clone(index));
        }

        let index = Arc::new(VectorIndex::load(&self.dir, dataset, self.dimension, self.trust)?);
        tracing::info!(
            "Loaded index for '{dataset}' ({} entries, verified: {})",
            index.len(),
            index.is_verified()
        );

        // another request may have loaded it meanwhile; keep the first
        let mut loaded = self.loaded.write();
        Ok(Arc::clone(
            loaded.entry(dataset.to_string()).or_insert(index),
        ))
    }

    /// Make a freshly built index current, replacing any previous one.
    pub fn insert(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let index = Arc::new(index);
        self.loaded
            .write()
            .insert(index.dataset().to_string(), Arc::clone(&index));
        index
    }

    /// Datasets that are loaded or stored on disk.
    pub fn list(&self) -> Vec<DatasetInfo> {
        let mut datasets: HashMap<String, DatasetInfo> = self
            .loaded
            .read()
            .iter()
            .map(|(name, index)| {
                (
                    name.clone(),
                    DatasetInfo {
                        dataset: name.clone(),
                        loaded: true,
                        entries: index.len(),
                    },
                )
            })
            .collect();

        if let Ok(read_dir) = std::fs::read_dir(&self.dir) {
            for entry in read_dir.flatten() {
                let manifest = match store::read_manifest(&entry.path()) {
                    Ok(Some(m)) => m,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!("Skipping {}: {e}", entry.path().display());
                        continue;
                    }
                };
                datasets
                    .entry(manifest.dataset.clone())
                    .or_insert(DatasetInfo {
                        dataset: manifest.dataset,
                        loaded: false,
                        entries: manifest.entry_count,
                    });
            }
        }

        let mut list: Vec<DatasetInfo> = datasets.into_values().collect();
        list.sort_by(|a, b| a.dataset.cmp(&b.dataset));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMetadata};

    fn tiny_index(dataset: &str) -> VectorIndex {
        let chunk = Chunk {
            text: "Title: t\nAnswer: a".to_string(),
            metadata: Arc::new(ChunkMetadata {
                question_id: 1,
                title: "t".to_string(),
                link: "https://stackoverflow.com/q/1".to_string(),
                answer_count: 1,
                answer_score: 0,
                answer_body: "a".to_string(),
            }),
        };
        VectorIndex::from_embeddings(dataset, "m", 2, vec![chunk], vec![vec![1.0, 0.0]]).unwrap()
    }

    #[test]
    fn test_dataset_dir_name() {
        let name = dataset_dir_name("c++");
        assert!(name.starts_with("c__-"), "got {name}");
        assert_eq!(name.len(), "c__-".len() + 8);
        assert_eq!(name, dataset_dir_name("c++"));
        assert!(dataset_dir_name("../etc").starts_with("___etc-"));
        assert!(!dataset_dir_name("../etc").contains('/'));
    }

    #[test]
    fn test_similar_tags_get_distinct_dirs() {
        assert_ne!(dataset_dir_name("c#"), dataset_dir_name("c_"));
        assert_ne!(dataset_dir_name("C++"), dataset_dir_name("c++"));
    }

    #[test]
    fn test_similar_tags_stored_side_by_side() {
        let tmp = tempfile::tempdir().unwrap();
        tiny_index("c#").save(tmp.path()).unwrap();
        tiny_index("c_").save(tmp.path()).unwrap();

        let registry = IndexRegistry::new(tmp.path().to_path_buf(), 2, IndexTrust::Verified);
        assert_eq!(registry.get("c#").unwrap().dataset(), "c#");
        assert_eq!(registry.get("c_").unwrap().dataset(), "c_");
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_trust_default_is_verified() {
        assert_eq!(IndexTrust::default(), IndexTrust::Verified);
    }

    #[test]
    fn test_registry_loads_once() {
        let tmp = tempfile::tempdir().unwrap();
        tiny_index("python").save(tmp.path()).unwrap();

        let registry = IndexRegistry::new(tmp.path().to_path_buf(), 2, IndexTrust::Verified);
        let first = registry.get("python").unwrap();
        let second = registry.get("python").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_registry_missing_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = IndexRegistry::new(tmp.path().to_path_buf(), 2, IndexTrust::Verified);
        assert!(matches!(registry.get("go"), Err(IndexError::NotFound(_))));
    }

    #[test]
    fn test_insert_replaces_loaded_index() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = IndexRegistry::new(tmp.path().to_path_buf(), 2, IndexTrust::Verified);
        let old = registry.insert(tiny_index("java"));
        let new = registry.insert(tiny_index("java"));
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(Arc::ptr_eq(&registry.get("java").unwrap(), &new));
    }

    #[test]
    fn test_list_merges_disk_and_memory() {
        let tmp = tempfile::tempdir().unwrap();
        tiny_index("c++").save(tmp.path()).unwrap();
        let registry = IndexRegistry::new(tmp.path().to_path_buf(), 2, IndexTrust::Verified);
        registry.insert(tiny_index("rust"));

        let list = registry.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].dataset, "c++");
        assert!(!list[0].loaded);
        assert_eq!(list[0].entries, 1);
        assert_eq!(list[1].dataset, "rust");
        assert!(list[1].loaded);
    }
}
