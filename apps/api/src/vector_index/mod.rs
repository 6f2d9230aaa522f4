//! Vector Index: persistent, id-addressable similarity index with a metadata side table.
//!
//! One `RwLock` guards the whole `{rows, metadata, next_id}` aggregate. `add` holds
//! the write lock from id assignment through the durable persist, so concurrent
//! writers are serialized and no reader ever observes a half-applied batch.
//!
//! Persisted state that cannot be read is replaced by an empty index (logged at
//! `error`), trading durability of the unreadable files for availability.

pub mod flat;
pub mod persistence;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use self::flat::{normalize_l2, FlatIpIndex, NO_MATCH};
use self::persistence::{IndexPaths, LoadOutcome};

/// Dimension of `text-embedding-3-small`.
pub const DEFAULT_DIMENSION: usize = 1536;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Index storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index metadata serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Persisted index is corrupt: {0}")]
    Corrupt(String),

    #[error("Index lock poisoned")]
    Poisoned,
}

/// One search result: the stored metadata and its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit<M> {
    pub id: i64,
    pub metadata: M,
    pub score: f32,
}

struct IndexState<M> {
    rows: FlatIpIndex,
    metadata: BTreeMap<i64, M>,
    next_id: i64,
}

impl<M> IndexState<M> {
    fn empty(dimension: usize) -> Self {
        Self {
            rows: FlatIpIndex::new(dimension),
            metadata: BTreeMap::new(),
            next_id: 0,
        }
    }
}

pub struct VectorIndex<M> {
    dimension: usize,
    paths: IndexPaths,
    state: RwLock<IndexState<M>>,
}

impl<M> VectorIndex<M>
where
    M: Serialize + DeserializeOwned + Clone,
{
    /// Opens the index persisted at `path` (the blob; the sidecar sits next to it).
    ///
    /// Missing files start an empty index. Unreadable or inconsistent files also
    /// start an empty index, logged at `error` so operators can tell the two apart.
    /// Only a zero `dimension` is rejected.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::DimensionMismatch(
                "index dimension must be greater than zero".to_string(),
            ));
        }

        let paths = IndexPaths::from_blob_path(path);
        let state = match persistence::load::<M>(&paths, dimension) {
            LoadOutcome::Missing => {
                info!(
                    "No persisted index at {}; initialized empty index (dimension {dimension})",
                    paths.blob.display()
                );
                IndexState::empty(dimension)
            }
            LoadOutcome::Loaded(snapshot) => {
                if snapshot.discarded_rows > 0 {
                    warn!(
                        "Discarded {} uncommitted rows from {} (interrupted batch)",
                        snapshot.discarded_rows,
                        paths.blob.display()
                    );
                }
                info!(
                    "Loaded index from {} ({} records, next_id {})",
                    paths.blob.display(),
                    snapshot.metadata.len(),
                    snapshot.next_id
                );
                IndexState {
                    rows: snapshot.index,
                    metadata: snapshot.metadata,
                    next_id: snapshot.next_id,
                }
            }
            LoadOutcome::Corrupt(e) => {
                error!(
                    "Persisted index at {} is unreadable, starting empty; \
                     the files will be overwritten on the next add: {e}",
                    paths.blob.display()
                );
                IndexState::empty(dimension)
            }
        };

        Ok(Self {
            dimension,
            paths,
            state: RwLock::new(state),
        })
    }

    /// Adds a batch and persists the whole index before returning.
    ///
    /// Ids `next_id..next_id + n` are assigned in input order and returned. If the
    /// persist fails the batch is rolled back in memory and the error returned, so a
    /// batch is either durable or absent.
    pub fn add(
        &self,
        mut vectors: Vec<Vec<f32>>,
        metadatas: Vec<M>,
    ) -> Result<Vec<i64>, IndexError> {
        if vectors.len() != metadatas.len() {
            return Err(IndexError::DimensionMismatch(format!(
                "{} vectors but {} metadata entries",
                vectors.len(),
                metadatas.len()
            )));
        }
        for (i, vector) in vectors.iter_mut().enumerate() {
            self.check_vector(vector, &format!("vector {i}"))?;
            normalize_l2(vector);
        }
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.write()?;
        let first_id = state.next_id;
        let ids: Vec<i64> = (first_id..first_id + vectors.len() as i64).collect();
        let rows_before = state.rows.ntotal();

        state.rows.add_with_ids(&vectors, &ids);
        for (id, metadata) in ids.iter().zip(metadatas) {
            state.metadata.insert(*id, metadata);
        }
        state.next_id = first_id + ids.len() as i64;

        if let Err(e) = persistence::save(&self.paths, &state.rows, &state.metadata, state.next_id)
        {
            error!("Failed to persist index to {}: {e}", self.paths.blob.display());
            state.rows.truncate(rows_before);
            for id in &ids {
                state.metadata.remove(id);
            }
            state.next_id = first_id;
            return Err(e);
        }

        info!(
            "Added {} vectors (ids {}..={}) and persisted index",
            ids.len(),
            first_id,
            first_id + ids.len() as i64 - 1
        );
        Ok(ids)
    }

    /// Returns at most `top_k` hits, best first. An empty index yields no hits.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit<M>>, IndexError> {
        let mut query = query.to_vec();
        self.check_vector(&query, "query")?;
        normalize_l2(&mut query);

        let state = self.read()?;
        if state.rows.ntotal() == 0 || top_k == 0 {
            return Ok(Vec::new());
        }

        // The backend pads short result lists with NO_MATCH slots up to k.
        let k = top_k.min(state.rows.ntotal());
        let hits = state
            .rows
            .search(&query, k)
            .into_iter()
            .filter(|(id, _)| *id != NO_MATCH)
            .filter_map(|(id, score)| {
                state.metadata.get(&id).map(|metadata| SearchHit {
                    id,
                    metadata: metadata.clone(),
                    score,
                })
            })
            .collect();
        Ok(hits)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.read().map(|s| s.metadata.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record count without waiting on the lock. `None` while an `add` holds it,
    /// which includes the whole persist, so async callers never stall a worker.
    pub fn try_len(&self) -> Option<usize> {
        self.state.try_read().ok().map(|s| s.metadata.len())
    }

    pub fn next_id(&self) -> i64 {
        self.read().map(|s| s.next_id).unwrap_or(0)
    }

    pub fn path(&self) -> &Path {
        &self.paths.blob
    }

    /// Ends the index's lifecycle. Every successful `add` is already durable.
    pub fn close(self) {
        info!("Closed index at {}", self.paths.blob.display());
    }

    fn check_vector(&self, vector: &[f32], label: &str) -> Result<(), IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch(format!(
                "{label} has length {} but the index dimension is {}",
                vector.len(),
                self.dimension
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::InvalidVector(format!(
                "{label} contains a non-finite value"
            )));
        }
        Ok(())
    }

    /// Runs `f` while holding the write lock, as `add` does during a persist.
    #[cfg(test)]
    pub(crate) fn hold_write_for_test(&self, f: impl FnOnce()) {
        let _guard = self.state.write().unwrap();
        f();
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexState<M>>, IndexError> {
        self.state.read().map_err(|_| IndexError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexState<M>>, IndexError> {
        self.state.write().map_err(|_| IndexError::Poisoned)
    }
}
