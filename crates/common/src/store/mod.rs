//! Vector store abstraction
//!
//! Stores `(chunk_id, vector, metadata, text)` records and answers
//! nearest-neighbor queries. Vectors are L2-normalized before they reach the
//! store (see `index`), so similarity is a plain inner product - equivalent
//! to cosine - with 1.0 as the metric maximum.
//!
//! Two implementations:
//! - `MemoryStore` for ephemeral sessions and tests
//! - `JsonFileStore`, persisted at a configured path and reloaded on open;
//!   flushes go through a temp file renamed into place so the on-disk index
//!   is never partially written

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// On-disk format version; bumped on incompatible layout changes
const STORE_FORMAT_VERSION: u32 = 1;

/// Provenance metadata persisted with every vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Source file name
    pub filename: String,

    /// Page containing the chunk's first token (1-based)
    pub page: u32,

    /// Owning document id, used for unchanged-document skip detection
    pub document_id: String,
}

/// A persisted embedding record, one-to-one with a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,

    /// Chunk text, stored alongside the vector so retrieval can return
    /// context without a second lookup
    pub text: String,
}

/// A scored match, produced per query and never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub text: String,
    pub filename: String,
    pub page: u32,
    pub similarity_score: f32,
}

/// Trait for vector persistence backends
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite the record sharing the same `chunk_id`
    fn upsert(&self, record: EmbeddingRecord) -> Result<()>;

    /// Top-k records by descending similarity; ties broken by ascending
    /// `chunk_id`. `top_k` must be >= 1 and is clamped to the record count.
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>>;

    /// Remove every record
    fn delete_all(&self) -> Result<()>;

    /// Persist pending mutations (no-op for ephemeral backends)
    fn flush(&self) -> Result<()>;

    /// Number of stored records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a record with this chunk id exists
    fn contains(&self, chunk_id: &str) -> bool;
}

/// Shared in-memory state behind both store implementations
#[derive(Default)]
struct StoreState {
    dimension: Option<usize>,
    records: BTreeMap<String, EmbeddingRecord>,
}

impl StoreState {
    fn upsert(&mut self, record: EmbeddingRecord) -> Result<()> {
        if record.vector.is_empty() {
            return Err(AppError::index_write(format!(
                "refusing to store empty vector for chunk {}",
                record.chunk_id
            )));
        }
        match self.dimension {
            None => self.dimension = Some(record.vector.len()),
            Some(dimension) if dimension != record.vector.len() => {
                return Err(AppError::index_write(format!(
                    "vector dimension mismatch for chunk {}: store holds {}, got {}",
                    record.chunk_id,
                    dimension,
                    record.vector.len()
                )));
            }
            Some(_) => {}
        }

        self.records.insert(record.chunk_id.clone(), record);
        Ok(())
    }

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Err(AppError::validation("top_k must be a positive integer"));
        }
        if let Some(dimension) = self.dimension {
            if vector.len() != dimension {
                return Err(AppError::validation(format!(
                    "query vector dimension {} does not match store dimension {}",
                    vector.len(),
                    dimension
                )));
            }
        }

        let mut scored: Vec<RetrievalResult> = self
            .records
            .values()
            .map(|record| RetrievalResult {
                chunk_id: record.chunk_id.clone(),
                text: record.text.clone(),
                filename: record.metadata.filename.clone(),
                page: record.metadata.page,
                similarity_score: dot(vector, &record.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        scored.truncate(top_k.min(self.records.len()));

        Ok(scored)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Ephemeral in-memory store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for MemoryStore {
    fn upsert(&self, record: EmbeddingRecord) -> Result<()> {
        write_locked(&self.state)?.upsert(record)
    }

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        read_locked(&self.state)?.query(vector, top_k)
    }

    fn delete_all(&self) -> Result<()> {
        let mut state = write_locked(&self.state)?;
        state.records.clear();
        state.dimension = None;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.state.read().map(|s| s.records.len()).unwrap_or(0)
    }

    fn contains(&self, chunk_id: &str) -> bool {
        self.state
            .read()
            .map(|s| s.records.contains_key(chunk_id))
            .unwrap_or(false)
    }
}

/// Serialized layout of the store file
#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    dimension: Option<usize>,
    saved_at: DateTime<Utc>,
    records: Vec<EmbeddingRecord>,
}

/// Vector store persisted as JSON at a configured path
pub struct JsonFileStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing records if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let bytes = std::fs::read(&path).map_err(|e| {
                AppError::index_write(format!("failed to read {}: {}", path.display(), e))
            })?;
            let file: StoreFile = serde_json::from_slice(&bytes).map_err(|e| {
                AppError::index_write(format!("corrupt store file {}: {}", path.display(), e))
            })?;
            if file.version != STORE_FORMAT_VERSION {
                return Err(AppError::index_write(format!(
                    "unsupported store format version {} in {}",
                    file.version,
                    path.display()
                )));
            }
            let mut state = StoreState {
                dimension: file.dimension,
                records: BTreeMap::new(),
            };
            for record in file.records {
                state.records.insert(record.chunk_id.clone(), record);
            }
            tracing::debug!(
                path = %path.display(),
                records = state.records.len(),
                "Loaded vector store"
            );
            state
        } else {
            StoreState::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Write the current state to disk atomically (temp file + rename)
    fn write_file(&self, state: &StoreState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::index_write(format!(
                        "failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let file = StoreFile {
            version: STORE_FORMAT_VERSION,
            dimension: state.dimension,
            saved_at: Utc::now(),
            records: state.records.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec(&file)?;

        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, bytes).map_err(|e| {
            AppError::index_write(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::index_write(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

impl VectorStore for JsonFileStore {
    fn upsert(&self, record: EmbeddingRecord) -> Result<()> {
        write_locked(&self.state)?.upsert(record)
    }

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        read_locked(&self.state)?.query(vector, top_k)
    }

    fn delete_all(&self) -> Result<()> {
        let mut state = write_locked(&self.state)?;
        state.records.clear();
        state.dimension = None;
        self.write_file(&state)
    }

    fn flush(&self) -> Result<()> {
        let state = read_locked(&self.state)?;
        self.write_file(&state)
    }

    fn len(&self) -> usize {
        self.state.read().map(|s| s.records.len()).unwrap_or(0)
    }

    fn contains(&self, chunk_id: &str) -> bool {
        self.state
            .read()
            .map(|s| s.records.contains_key(chunk_id))
            .unwrap_or(false)
    }
}

fn read_locked(state: &RwLock<StoreState>) -> Result<std::sync::RwLockReadGuard<'_, StoreState>> {
    state
        .read()
        .map_err(|_| AppError::index_write("vector store lock poisoned"))
}

fn write_locked(
    state: &RwLock<StoreState>,
) -> Result<std::sync::RwLockWriteGuard<'_, StoreState>> {
    state
        .write()
        .map_err(|_| AppError::index_write("vector store lock poisoned"))
}
