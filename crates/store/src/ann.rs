//! Approximate Nearest Neighbor (ANN) index over document embeddings.
//!
//! The index is an HNSW graph (`hnsw_rs`, cosine distance) built in one pass
//! from every embedded document. It is never updated in place: writing a
//! document with a vector marks it stale, and a stale index refuses queries
//! until it is rebuilt.
//!
//! ## Trade-offs
//!
//! - **Speed**: sub-linear search instead of scoring every stored vector
//! - **Recall**: typically 95-99% (some true neighbours may be missed)
//! - **Build time**: a full rebuild is needed after embeddings change

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::StoreError;

/// Configuration for the HNSW vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    /// Build and query the index at all.
    /// Default: true
    pub enabled: bool,
    /// Number of neighbors per node (higher = better recall, slower build).
    /// Default: 16
    pub m: usize,
    /// Size of dynamic candidate list during construction.
    /// Default: 200
    pub ef_construction: usize,
    /// Size of dynamic candidate list during search. Raised to `k` when a
    /// query asks for more results.
    /// Default: 50
    pub ef_search: usize,
    /// Minimum number of indexable vectors before a graph is built.
    /// Default: 10
    pub min_vectors: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            min_vectors: 10,
        }
    }
}

impl VectorIndexConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    pub fn with_min_vectors(mut self, min: usize) -> Self {
        self.min_vectors = min;
        self
    }
}

/// Lifecycle of the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Turned off by configuration.
    Disabled,
    /// Never built, or too few vectors to build a graph.
    Absent,
    /// Built, but embedded documents were written afterwards.
    Stale,
    Ready,
}

/// Snapshot of the index reported by `/stats` and the rebuild endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexStatus {
    pub state: IndexState,
    pub vectors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

impl VectorIndexStatus {
    pub(crate) fn disabled() -> Self {
        Self {
            state: IndexState::Disabled,
            vectors: 0,
            dimension: None,
        }
    }

    pub(crate) fn absent() -> Self {
        Self {
            state: IndexState::Absent,
            vectors: 0,
            dimension: None,
        }
    }

    pub(crate) fn ready(index: &VectorIndex) -> Self {
        Self {
            state: IndexState::Ready,
            vectors: index.len(),
            dimension: Some(index.dimension()),
        }
    }

    pub(crate) fn stale(index: &VectorIndex) -> Self {
        Self {
            state: IndexState::Stale,
            ..Self::ready(index)
        }
    }
}

/// Failures of an indexed nearest-neighbour query.
///
/// Everything except [`VectorQueryError::Hydrate`] concerns the index alone
/// and is recoverable: an exhaustive scan can still answer the query.
#[derive(Debug, Clone, Error)]
pub enum VectorQueryError {
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),
    #[error("dimension mismatch: index holds {expected}-d vectors, query has {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("vector query failed: {0}")]
    QueryFailed(String),
    #[error("failed to load matched document: {0}")]
    Hydrate(#[source] StoreError),
}

impl VectorQueryError {
    /// Whether a caller may answer the same query by other means.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, VectorQueryError::Hydrate(_))
    }
}

/// Neighbour returned by the graph, already converted to a similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    /// Cosine similarity (1 - cosine distance).
    pub score: f32,
}

/// Built HNSW graph plus the id of every inserted vector.
pub struct VectorIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    ids: Vec<String>,
    dimension: usize,
    ef_search: usize,
}

impl VectorIndex {
    /// Build a graph from `(id, vector)` pairs.
    ///
    /// The first indexable vector fixes the dimension; vectors of another
    /// length and zero-norm vectors are skipped. Returns `None` when fewer
    /// than `min_vectors` remain.
    pub fn build(cfg: &VectorIndexConfig, entries: Vec<(String, Vec<f32>)>) -> Option<Self> {
        let mut dimension = None;
        let mut ids = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len());

        for (id, vector) in entries {
            if norm(&vector) == 0.0 {
                log::debug!("skipping zero-norm vector of document {id}");
                continue;
            }
            let expected = *dimension.get_or_insert(vector.len());
            if vector.len() != expected {
                log::warn!(
                    "skipping document {id}: {}-d vector in a {expected}-d index",
                    vector.len()
                );
                continue;
            }
            ids.push(id);
            vectors.push(vector);
        }

        let nb_elem = vectors.len();
        if nb_elem == 0 || nb_elem < cfg.min_vectors {
            log::info!(
                "vector index not built: {nb_elem} indexable vectors, {} required",
                cfg.min_vectors
            );
            return None;
        }

        let nb_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);
        let hnsw = Hnsw::<f32, DistCosine>::new(
            cfg.m,
            nb_elem,
            nb_layer,
            cfg.ef_construction,
            DistCosine {},
        );
        let data_for_insertion: Vec<(&Vec<f32>, usize)> =
            vectors.iter().enumerate().map(|(idx, vec)| (vec, idx)).collect();
        hnsw.parallel_insert(&data_for_insertion);

        Some(Self {
            hnsw,
            ids,
            dimension: dimension.unwrap_or_default(),
            ef_search: cfg.ef_search,
        })
    }

    /// Up to `k` nearest neighbours, most similar first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorQueryError> {
        if query.len() != self.dimension {
            return Err(VectorQueryError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if norm(query) == 0.0 || query.iter().any(|x| !x.is_finite()) {
            return Err(VectorQueryError::QueryFailed(
                "query vector must be finite with non-zero norm".into(),
            ));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let ef = self.ef_search.max(k);
        let mut hits = Vec::with_capacity(k);
        for neighbour in self.hnsw.search(query, k, ef) {
            let id = self.ids.get(neighbour.get_origin_id()).ok_or_else(|| {
                VectorQueryError::QueryFailed(format!(
                    "graph returned unknown point {}",
                    neighbour.get_origin_id()
                ))
            })?;
            hits.push(Neighbor {
                id: id.clone(),
                score: 1.0 - neighbour.distance,
            });
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
