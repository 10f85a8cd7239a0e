use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::{dataset_dir_name, IndexTrust};
use crate::error::IndexError;
use crate::models::{Chunk, ChunkMetadata};

pub const FORMAT_VERSION: u32 = 1;

const ENTRIES_FILE: &str = "entries.json";
const MANIFEST_FILE: &str = "manifest.json";

/// Describes an `entries.json` file and pins its checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub dataset: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub entry_count: usize,
    /// Hex sha256 of the entries file bytes
    pub sha256: String,
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
}

/// One embedded chunk.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub text: String,
    pub metadata: Arc<ChunkMetadata>,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub text: String,
    pub metadata: Arc<ChunkMetadata>,
    pub score: f32,
}

// On disk each record's metadata is stored once and referenced by position.
#[derive(Serialize, Deserialize)]
struct EntriesFile {
    records: Vec<ChunkMetadata>,
    entries: Vec<StoredEntry>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    record: usize,
    text: String,
    embedding: Vec<f32>,
}

/// Immutable in-memory vector index for one dataset with exact cosine search.
#[derive(Debug)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
    verified: bool,
}

impl VectorIndex {
    /// Assemble an index from chunks and their embeddings (parallel slices).
    pub fn from_embeddings(
        dataset: &str,
        embedding_model: &str,
        dimension: usize,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(IndexError::DimensionMismatch {
                got: bad.len(),
                want: dimension,
            });
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry {
                text: chunk.text,
                metadata: chunk.metadata,
                embedding,
            })
            .collect();

        Ok(Self {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                dataset: dataset.to_string(),
                embedding_model: embedding_model.to_string(),
                dimension,
                entry_count: entries.len(),
                sha256: String::new(),
                build_id: Uuid::new_v4(),
                built_at: Utc::now(),
            },
            entries,
            verified: true,
        })
    }

    pub fn dataset(&self) -> &str {
        &self.manifest.dataset
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// False when loaded under `AllowUnverified` without a matching manifest.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// The `limit` nearest entries by cosine similarity, best first.
    /// Equal scores keep insertion order.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Vec<VectorHit> {
        if limit == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, e)| VectorHit {
                text: e.text.clone(),
                metadata: Arc::clone(&e.metadata),
                score,
            })
            .collect()
    }

    /// Persist under `{indexes_dir}/{dataset}/`. Entries are written before the
    /// manifest so a crash never leaves a manifest pointing at stale entries.
    pub fn save(&mut self, indexes_dir: &Path) -> Result<(), IndexError> {
        let dir = indexes_dir.join(dataset_dir_name(&self.manifest.dataset));
        std::fs::create_dir_all(&dir)?;

        let bytes = serde_json::to_vec(&self.to_file())?;
        self.manifest.sha256 = sha256_hex(&bytes);
        self.manifest.entry_count = self.entries.len();

        write_atomic(&dir.join(ENTRIES_FILE), &bytes)?;
        write_atomic(
            &dir.join(MANIFEST_FILE),
            &serde_json::to_vec_pretty(&self.manifest)?,
        )?;

        tracing::info!(
            "Saved index for '{}' ({} entries, build {})",
            self.manifest.dataset,
            self.entries.len(),
            self.manifest.build_id
        );
        Ok(())
    }

    /// Load a dataset's index, checking it against its manifest.
    pub fn load(
        indexes_dir: &Path,
        dataset: &str,
        expected_dimension: usize,
        trust: IndexTrust,
    ) -> Result<Self, IndexError> {
        let dir = indexes_dir.join(dataset_dir_name(dataset));
        let entries_path = dir.join(ENTRIES_FILE);
        if !entries_path.exists() {
            return Err(IndexError::NotFound(dataset.to_string()));
        }

        let bytes = std::fs::read(&entries_path)?;
        let manifest = read_manifest(&dir)?;

        let untrusted = |reason: String| IndexError::Untrusted {
            dataset: dataset.to_string(),
            reason,
        };

        let problem = match &manifest {
            None => Some("manifest missing".to_string()),
            Some(m) if m.format_version != FORMAT_VERSION => {
                return Err(IndexError::UnsupportedVersion(m.format_version));
            }
            Some(m) if m.dataset != dataset => Some(format!(
                "manifest belongs to dataset '{}'",
                m.dataset
            )),
            Some(m) if m.sha256 != sha256_hex(&bytes) => Some("checksum mismatch".to_string()),
            Some(_) => None,
        };

        let verified = match (problem, trust) {
            (None, _) => true,
            (Some(reason), IndexTrust::Verified) => return Err(untrusted(reason)),
            (Some(reason), IndexTrust::AllowUnverified) => {
                tracing::warn!("Loading unverified index for '{dataset}': {reason}");
                false
            }
        };

        let file: EntriesFile = serde_json::from_slice(&bytes)?;
        let records: Vec<Arc<ChunkMetadata>> = file.records.into_iter().map(Arc::new).collect();

        let mut entries = Vec::with_capacity(file.entries.len());
        for stored in file.entries {
            if stored.embedding.len() != expected_dimension {
                return Err(IndexError::DimensionMismatch {
                    got: stored.embedding.len(),
                    want: expected_dimension,
                });
            }
            let metadata = records
                .get(stored.record)
                .cloned()
                .ok_or_else(|| untrusted(format!("entry references missing record {}", stored.record)))?;
            entries.push(IndexEntry {
                text: stored.text,
                metadata,
                embedding: stored.embedding,
            });
        }

        let manifest = match manifest {
            Some(m) if m.dimension != expected_dimension => {
                return Err(IndexError::DimensionMismatch {
                    got: m.dimension,
                    want: expected_dimension,
                });
            }
            Some(m) => m,
            None => IndexManifest {
                format_version: FORMAT_VERSION,
                dataset: dataset.to_string(),
                embedding_model: String::new(),
                dimension: expected_dimension,
                entry_count: entries.len(),
                sha256: sha256_hex(&bytes),
                build_id: Uuid::nil(),
                built_at: DateTime::<Utc>::UNIX_EPOCH,
            },
        };

        Ok(Self {
            manifest,
            entries,
            verified,
        })
    }

    fn to_file(&self) -> EntriesFile {
        let mut records: Vec<ChunkMetadata> = Vec::new();
        let mut entries = Vec::with_capacity(self.entries.len());
        let mut last: Option<&Arc<ChunkMetadata>> = None;

        for entry in &self.entries {
            // chunks of one record are contiguous and share one Arc
            let same = last.is_some_and(|prev| Arc::ptr_eq(prev, &entry.metadata));
            if !same {
                records.push(ChunkMetadata::clone(&entry.metadata));
                last = Some(&entry.metadata);
            }
            entries.push(StoredEntry {
                record: records.len() - 1,
                text: entry.text.clone(),
                embedding: entry.embedding.clone(),
            });
        }

        EntriesFile { records, entries }
    }
}

/// Read only the manifest of a stored index, if there is one.
pub fn read_manifest(dir: &Path) -> Result<Option<IndexManifest>, IndexError> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(&path)?;
    Ok(Some(serde_json::from_slice(&data)?))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
