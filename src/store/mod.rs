//! Vector-store abstraction.
//!
//! The [`VectorStore`] trait is the single seam between the pipeline and
//! persistence. The [`sqlite`] backend is the durable store (survives
//! process restarts, reopened with the same dimensionality check); the
//! [`memory`] backend backs tests.
//!
//! The indexer exclusively owns the write path ([`VectorStore::replace_artifact`],
//! [`VectorStore::delete_artifact`]); the retriever only reads.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, MediaKind};

/// Index-lifetime metadata, recorded at first write. Mixing embedding
/// dimensionalities in one store is forbidden; the indexer and retriever
/// both compare against this before touching vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub dims: usize,
    pub model: String,
}

/// Candidate narrowing applied before ranking.
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub artifact_id: Option<String>,
    /// Empty means all kinds.
    pub kinds: Vec<MediaKind>,
}

impl VectorFilter {
    pub fn matches(&self, artifact_id: &str, kind: MediaKind) -> bool {
        if let Some(ref want) = self.artifact_id {
            if want != artifact_id {
                return false;
            }
        }
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

/// A scored chunk candidate returned from [`VectorStore::query`].
#[derive(Debug, Clone)]
pub struct VectorCandidate {
    pub chunk_id: String,
    pub artifact_id: String,
    pub seq: i64,
    pub kind: MediaKind,
    pub text: String,
    /// Cosine similarity against the query vector.
    pub score: f32,
    /// Global insertion position, used as the deterministic tie-break.
    pub position: i64,
}

/// Abstract storage backend for the chunk index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embedding metadata recorded at first write; `None` while empty.
    async fn meta(&self) -> Result<Option<IndexMeta>>;

    /// Atomically replace all chunks and vectors for one artifact.
    /// `chunks` and `vectors` are parallel slices. A concurrent reader
    /// observes either the old or the new chunk set, never a mixture.
    async fn replace_artifact(
        &self,
        artifact_id: &str,
        filename: &str,
        kind: MediaKind,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        meta: &IndexMeta,
    ) -> Result<()>;

    /// Remove an artifact and all of its chunks and vectors.
    async fn delete_artifact(&self, artifact_id: &str) -> Result<()>;

    /// Score stored vectors against `query` (after filtering), rank by
    /// descending similarity with the insertion-order tie-break, and
    /// return at most `k` candidates. An empty store returns an empty list.
    async fn query(
        &self,
        query: &[f32],
        k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorCandidate>>;

    /// Number of indexed chunks.
    async fn chunk_count(&self) -> Result<i64>;
}

/// Rank candidates: score descending, ties broken by insertion position
/// ascending (lower chunk sequence first), truncated to `k`.
pub fn rank_candidates(mut candidates: Vec<VectorCandidate>, k: usize) -> Vec<VectorCandidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.position.cmp(&b.position))
    });
    candidates.truncate(k);
    candidates
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`; `0.0` for empty or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
