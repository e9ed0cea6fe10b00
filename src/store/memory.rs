//! In-memory [`VectorStore`] for tests.
//!
//! `HashMap`/`Vec` behind `std::sync::RwLock`; brute-force cosine
//! similarity. Replacement holds the write lock for the whole swap, so
//! readers see the old or the new chunk set, never a mixture.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{Chunk, MediaKind};

use super::{cosine_similarity, rank_candidates, IndexMeta, VectorCandidate, VectorFilter, VectorStore};

struct StoredChunk {
    chunk: Chunk,
    kind: MediaKind,
    vector: Vec<f32>,
    position: i64,
}

#[derive(Default)]
struct Inner {
    meta: Option<IndexMeta>,
    artifacts: HashMap<String, String>, // id -> filename
    chunks: Vec<StoredChunk>,
    next_position: i64,
}

/// In-memory store; the test double for [`super::sqlite::SqliteStore`].
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn meta(&self) -> Result<Option<IndexMeta>> {
        Ok(self.inner.read().unwrap().meta.clone())
    }

    async fn replace_artifact(
        &self,
        artifact_id: &str,
        filename: &str,
        kind: MediaKind,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        meta: &IndexMeta,
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch for artifact {}: {} vs {}",
                artifact_id,
                chunks.len(),
                vectors.len()
            );
        }

        let mut inner = self.inner.write().unwrap();
        match &inner.meta {
            None => inner.meta = Some(meta.clone()),
            Some(existing) if existing.dims != meta.dims => {
                bail!(
                    "index dimensionality is {} but write carries {}",
                    existing.dims,
                    meta.dims
                );
            }
            Some(_) => {}
        }

        inner.chunks.retain(|sc| sc.chunk.artifact_id != artifact_id);
        inner
            .artifacts
            .insert(artifact_id.to_string(), filename.to_string());
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            let position = inner.next_position;
            inner.next_position += 1;
            inner.chunks.push(StoredChunk {
                chunk: chunk.clone(),
                kind,
                vector: vector.clone(),
                position,
            });
        }
        Ok(())
    }

    async fn delete_artifact(&self, artifact_id: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.chunks.retain(|sc| sc.chunk.artifact_id != artifact_id);
        inner.artifacts.remove(artifact_id);
        Ok(())
    }

    async fn query(
        &self,
        query: &[f32],
        k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorCandidate>> {
        let inner = self.inner.read().unwrap();
        let candidates: Vec<VectorCandidate> = inner
            .chunks
            .iter()
            .filter(|sc| filter.matches(&sc.chunk.artifact_id, sc.kind))
            .map(|sc| VectorCandidate {
                chunk_id: sc.chunk.id.clone(),
                artifact_id: sc.chunk.artifact_id.clone(),
                seq: sc.chunk.seq,
                kind: sc.kind,
                text: sc.chunk.text.clone(),
                score: cosine_similarity(query, &sc.vector),
                position: sc.position,
            })
            .collect();

        Ok(rank_candidates(candidates, k))
    }

    async fn chunk_count(&self) -> Result<i64> {
        Ok(self.inner.read().unwrap().chunks.len() as i64)
    }
}
