//! Known-face embedding store
//!
//! Loaded once at startup from a JSON file holding two parallel lists:
//!
//! ```json
//! { "names": ["alice", "bob"], "embeddings": [[0.1, 0.2], [0.3, 0.4]] }
//! ```
//!
//! The store is read-only afterwards and can be shared freely between workers.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::DataLoadError;

/// A named reference embedding
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub name: String,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(name: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            vector,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingsFile {
    names: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

/// Immutable set of reference embeddings, in file order
#[derive(Debug, Clone, Default)]
pub struct EmbeddingStore {
    records: Vec<EmbeddingRecord>,
}

impl EmbeddingStore {
    /// Load and validate the embeddings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataLoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DataLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: EmbeddingsFile =
            serde_json::from_str(&content).map_err(|source| DataLoadError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        if file.names.len() != file.embeddings.len() {
            return Err(DataLoadError::LengthMismatch {
                names: file.names.len(),
                vectors: file.embeddings.len(),
            });
        }
        if file.names.is_empty() {
            return Err(DataLoadError::Empty {
                path: path.to_path_buf(),
            });
        }

        let records = file
            .names
            .into_iter()
            .zip(file.embeddings)
            .map(|(name, vector)| EmbeddingRecord { name, vector })
            .collect();
        let store = Self::from_records(records)?;

        info!(
            "Loaded {} reference embeddings (dim {}) from {}",
            store.len(),
            store.dimension().unwrap_or(0),
            path.display()
        );
        Ok(store)
    }

    /// Build a store from in-memory records; all vectors must share a dimension
    pub fn from_records(records: Vec<EmbeddingRecord>) -> Result<Self, DataLoadError> {
        if let Some(first) = records.first() {
            let expected = first.vector.len();
            for (index, record) in records.iter().enumerate() {
                if record.vector.len() != expected {
                    return Err(DataLoadError::InconsistentDimension {
                        index,
                        expected,
                        found: record.vector.len(),
                    });
                }
            }
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Vector length shared by every record, `None` when empty
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.vector.len())
    }
}
