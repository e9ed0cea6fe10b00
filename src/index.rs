//! Index-time orchestration: embed chunks in batches and commit them as one
//! atomic per-artifact replacement.
//!
//! Concurrent ingestion of *different* artifacts is allowed; ingestion of
//! the same artifact id is serialized through a per-id lock so the final
//! index state is one submission's chunk set, never a mixture.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;
use crate::models::{Artifact, Chunk};
use crate::pipeline::Deadline;
use crate::providers::Embedder;
use crate::store::{IndexMeta, VectorStore};

/// Embeds chunk batches and writes them to the vector store.
pub struct Indexer {
    batch_size: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Indexer {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Embed `chunks` and atomically replace the artifact's index entries.
    ///
    /// On any failure the store keeps the artifact's previous state. An
    /// artifact whose text produced no chunks still clears its previous
    /// entries.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Config`] when the embedder's dimensionality does
    /// not match an existing index; [`PipelineError::Embedding`] when a
    /// batch fails after retries; [`PipelineError::Timeout`] when the
    /// deadline expires between batches.
    pub async fn index_artifact(
        &self,
        store: &dyn VectorStore,
        embedder: &dyn Embedder,
        artifact: &Artifact,
        chunks: &[Chunk],
        deadline: &Deadline,
    ) -> Result<(), PipelineError> {
        let lock = self.lock_for(&artifact.id).await;
        let _guard = lock.lock().await;

        if let Some(meta) = store.meta().await? {
            if meta.dims != embedder.dims() {
                return Err(PipelineError::config(format!(
                    "index was built with {} dimensions but embedder '{}' produces {}",
                    meta.dims,
                    embedder.model_name(),
                    embedder.dims()
                )));
            }
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            deadline.check("embedding")?;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_vecs = embedder
                .embed(&texts)
                .await
                .map_err(|e| PipelineError::Embedding(e.to_string()))?;
            if batch_vecs.len() != batch.len() {
                return Err(PipelineError::Embedding(format!(
                    "embedder returned {} vectors for a batch of {}",
                    batch_vecs.len(),
                    batch.len()
                )));
            }
            vectors.extend(batch_vecs);
        }

        let meta = IndexMeta {
            dims: embedder.dims(),
            model: embedder.model_name().to_string(),
        };
        store
            .replace_artifact(&artifact.id, &artifact.filename, artifact.kind, chunks, &vectors, &meta)
            .await?;

        info!(
            artifact = %artifact.id,
            chunks = chunks.len(),
            "artifact indexed"
        );
        Ok(())
    }

    async fn lock_for(&self, artifact_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(artifact_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
